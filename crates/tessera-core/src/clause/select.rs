//! Select clauses.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::SelectClause;
use crate::variable::Variable;

/// Selects a fixed set of variable names.
#[derive(Debug, Clone)]
pub struct VariableNames {
    names: HashSet<String>,
}

impl VariableNames {
    /// Creates a selection of these names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl SelectClause for VariableNames {
    fn selects(&self, variable: &Variable) -> bool {
        self.names.contains(variable.name())
    }
}

/// Selects variables accepted by a closure.
pub struct PredicateSelect {
    predicate: Arc<dyn Fn(&Variable) -> bool + Send + Sync>,
}

impl PredicateSelect {
    /// Creates a selection from a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Variable) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

impl SelectClause for PredicateSelect {
    fn selects(&self, variable: &Variable) -> bool {
        (self.predicate)(variable)
    }
}

impl fmt::Debug for PredicateSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateSelect").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_common::types::ValueType;

    #[test]
    fn test_variable_names() {
        let clause = VariableNames::new(["a", "b"]);
        assert!(clause.selects(&Variable::new("a", ValueType::Text, "P")));
        assert!(!clause.selects(&Variable::new("c", ValueType::Text, "P")));
    }

    #[test]
    fn test_predicate_select() {
        let clause = PredicateSelect::new(|v| v.value_type() == ValueType::Integer);
        assert!(clause.selects(&Variable::new("AGE", ValueType::Integer, "P")));
        assert!(!clause.selects(&Variable::new("SEX", ValueType::Text, "P")));
    }
}
