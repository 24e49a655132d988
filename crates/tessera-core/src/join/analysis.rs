//! Variable analysis of a join.
//!
//! For every variable name found across the member tables, the analysis
//! records the key of its definition and the members defining it, in
//! member order. Two definitions of one name with different keys make the
//! whole join invalid.

use std::collections::HashMap;

use tessera_common::error::{SchemaConflict, TesseraResult};

use crate::table::TableRef;
use crate::variable::{JoinVariableKey, Variable};

/// One variable of a join.
#[derive(Debug, Clone)]
pub struct AnalyzedVariable {
    /// Definition from the first member defining the variable.
    pub variable: Variable,
    /// Key every definition agrees on.
    pub key: JoinVariableKey,
    /// Indices of the members defining the variable, ascending.
    pub owners: Vec<usize>,
}

/// The outcome of a successful analysis.
#[derive(Debug, Default)]
pub struct VariableAnalysis {
    /// Variable names in first-seen order.
    order: Vec<String>,
    variables: HashMap<String, AnalyzedVariable>,
}

impl VariableAnalysis {
    /// Analyzes the members of a join.
    ///
    /// The outer error is a member failing to list its variables; the inner
    /// one is a conflict between definitions.
    pub fn analyze(
        join: &str,
        tables: &[TableRef],
    ) -> TesseraResult<Result<Self, SchemaConflict>> {
        let mut analysis = Self::default();

        for (index, table) in tables.iter().enumerate() {
            for variable in table.variables()? {
                let key = variable.join_key();
                match analysis.variables.get_mut(variable.name()) {
                    Some(existing) if existing.key != key => {
                        return Ok(Err(SchemaConflict {
                            table: join.to_string(),
                            variable: variable.name().to_string(),
                            first: existing.key.to_string(),
                            second: key.to_string(),
                        }));
                    }
                    Some(existing) => {
                        if existing.owners.last() != Some(&index) {
                            existing.owners.push(index);
                        }
                    }
                    None => {
                        analysis.order.push(variable.name().to_string());
                        analysis.variables.insert(
                            variable.name().to_string(),
                            AnalyzedVariable {
                                key,
                                variable: variable.with_index(analysis.order.len() - 1),
                                owners: vec![index],
                            },
                        );
                    }
                }
            }
        }
        Ok(Ok(analysis))
    }

    /// Returns a variable by name.
    pub fn get(&self, name: &str) -> Option<&AnalyzedVariable> {
        self.variables.get(name)
    }

    /// Returns the variables in first-seen order.
    pub fn variables(&self) -> impl Iterator<Item = &AnalyzedVariable> {
        self.order.iter().filter_map(|name| self.variables.get(name))
    }

    /// Returns the number of distinct variables.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no member defines any variable.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
