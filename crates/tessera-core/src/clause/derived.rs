//! List clauses deriving new variables.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tessera_common::error::{TesseraError, TesseraResult};
use tessera_common::types::Value;

use super::ListClause;
use crate::table::{TableRef, ValueSet, ValueTable, VariableValueSource};
use crate::variable::Variable;

/// Computes a derived value from a row of the wrapped table.
pub type DeriveFn =
    Arc<dyn Fn(&dyn ValueTable, &dyn ValueSet) -> TesseraResult<Value> + Send + Sync>;

/// A list of derived variables, each computed by a closure over the
/// wrapped table's rows.
///
/// # Example
///
/// ```rust
/// use tessera_common::types::{Value, ValueType};
/// use tessera_core::clause::DerivedVariables;
/// use tessera_core::variable::Variable;
///
/// let derived = DerivedVariables::new()
///     .alias(Variable::new("AGE_YEARS", ValueType::Integer, "Participant"), "AGE")
///     .with(Variable::new("ONE", ValueType::Integer, "Participant"), |_, _| {
///         Ok(Value::integer(1))
///     });
/// assert_eq!(derived.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct DerivedVariables {
    entries: Vec<(Variable, DeriveFn)>,
}

impl DerivedVariables {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable computed by a closure.
    #[must_use]
    pub fn with<F>(mut self, variable: Variable, derive: F) -> Self
    where
        F: Fn(&dyn ValueTable, &dyn ValueSet) -> TesseraResult<Value> + Send + Sync + 'static,
    {
        self.entries.push((variable, Arc::new(derive)));
        self
    }

    /// Adds a variable copying the values of a wrapped table variable.
    #[must_use]
    pub fn alias(self, variable: Variable, source: impl Into<String>) -> Self {
        let source = source.into();
        self.with(variable, move |table, row| {
            let source = table.variable(&source)?;
            table.value(&source, row)
        })
    }

    /// Returns the number of derived variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no variable is derived.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ListClause for DerivedVariables {
    fn sources(&self, table: &TableRef) -> TesseraResult<Vec<Arc<dyn VariableValueSource>>> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        let mut sources: Vec<Arc<dyn VariableValueSource>> = Vec::with_capacity(self.entries.len());
        for (index, (variable, derive)) in self.entries.iter().enumerate() {
            if !seen.insert(variable.name()) {
                return Err(TesseraError::invalid_argument(format!(
                    "derived variable '{}' listed twice",
                    variable.name()
                )));
            }
            sources.push(Arc::new(DerivedSource {
                variable: variable.clone().with_index(index),
                table: Arc::clone(table),
                derive: Arc::clone(derive),
            }));
        }
        Ok(sources)
    }
}

impl fmt::Debug for DerivedVariables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(v, _)| v.name()))
            .finish()
    }
}

/// Source of one derived variable, bound to the table it reads.
struct DerivedSource {
    variable: Variable,
    table: TableRef,
    derive: DeriveFn,
}

impl VariableValueSource for DerivedSource {
    fn variable(&self) -> &Variable {
        &self.variable
    }

    fn value(&self, value_set: &dyn ValueSet) -> TesseraResult<Value> {
        (self.derive)(&*self.table, value_set)
    }
}

impl fmt::Debug for DerivedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedSource")
            .field("variable", &self.variable.name())
            .field("table", &self.table.name())
            .finish_non_exhaustive()
    }
}
