//! Where clauses.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tessera_common::error::TesseraResult;

use super::WhereClause;
use crate::table::{ValueSet, ValueTable};

type RowPredicate = dyn Fn(&dyn ValueTable, &dyn ValueSet) -> TesseraResult<bool> + Send + Sync;

type ViewRowPredicate =
    dyn Fn(&dyn ValueTable, &dyn ValueTable, &dyn ValueSet) -> TesseraResult<bool> + Send + Sync;

/// Accepts rows for which a closure holds.
///
/// The closure receives the row's table, so it can read any variable of
/// the row.
///
/// # Example
///
/// ```rust
/// use tessera_core::clause::PredicateWhere;
/// use tessera_core::table::ValueTable;
///
/// let adults = PredicateWhere::new(|table, row| {
///     let age = table.variable("AGE")?;
///     Ok(table.value(&age, row)?.as_integer().map_or(false, |a| a >= 18))
/// });
/// # let _ = adults;
/// ```
pub struct PredicateWhere {
    predicate: Arc<RowPredicate>,
}

impl PredicateWhere {
    /// Creates a filter from a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&dyn ValueTable, &dyn ValueSet) -> TesseraResult<bool> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

impl WhereClause for PredicateWhere {
    fn accepts(
        &self,
        table: &dyn ValueTable,
        value_set: &Arc<dyn ValueSet>,
    ) -> TesseraResult<bool> {
        (self.predicate)(table, &**value_set)
    }
}

impl fmt::Debug for PredicateWhere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateWhere").finish_non_exhaustive()
    }
}

/// Accepts rows for which a closure over the view and the row holds.
///
/// The closure receives the view, the wrapped table and the row. It may
/// read the view's variables but not its rows. Outside a view the row's
/// table stands in for the view.
pub struct ViewPredicateWhere {
    predicate: Arc<ViewRowPredicate>,
}

impl ViewPredicateWhere {
    /// Creates a filter from a predicate over `(view, table, row)`.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&dyn ValueTable, &dyn ValueTable, &dyn ValueSet) -> TesseraResult<bool>
            + Send
            + Sync
            + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

impl WhereClause for ViewPredicateWhere {
    fn accepts(
        &self,
        table: &dyn ValueTable,
        value_set: &Arc<dyn ValueSet>,
    ) -> TesseraResult<bool> {
        (self.predicate)(table, table, &**value_set)
    }

    fn accepts_in_view(
        &self,
        view: &dyn ValueTable,
        table: &dyn ValueTable,
        value_set: &Arc<dyn ValueSet>,
    ) -> TesseraResult<bool> {
        (self.predicate)(view, table, &**value_set)
    }
}

impl fmt::Debug for ViewPredicateWhere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewPredicateWhere").finish_non_exhaustive()
    }
}

/// Accepts rows whose entity identifier is in a fixed set.
#[derive(Debug, Clone)]
pub struct EntityIdWhere {
    identifiers: HashSet<String>,
}

impl EntityIdWhere {
    /// Creates a filter accepting these identifiers.
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
        }
    }
}

impl WhereClause for EntityIdWhere {
    fn accepts(
        &self,
        _table: &dyn ValueTable,
        value_set: &Arc<dyn ValueSet>,
    ) -> TesseraResult<bool> {
        Ok(self.identifiers.contains(value_set.entity().identifier()))
    }
}
