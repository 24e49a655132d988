//! View clauses.
//!
//! A view is configured by three small contracts:
//!
//! - [`SelectClause`]: which existing variables are exposed
//! - [`WhereClause`]: which rows are exposed
//! - [`ListClause`]: derived variables computed from the wrapped table
//!
//! The universal cases (accept everything, reject everything) are variants
//! of [`Select`] and [`Where`] rather than implementations, so a view can
//! recognize them without probing and skip row loading altogether.
//!
//! A view takes its columns either from a Select clause or from a List
//! clause, never both; [`ColumnClause`] makes that choice explicit.

mod caching;
mod derived;
mod filter;
mod select;

use std::fmt;
use std::sync::Arc;

use tessera_common::error::TesseraResult;

use crate::table::{TableRef, ValueSet, ValueTable, VariableValueSource};
use crate::variable::Variable;

pub use caching::CachingWhereClause;
pub use derived::{DerivedVariables, DeriveFn};
pub use filter::{EntityIdWhere, PredicateWhere, ViewPredicateWhere};
pub use select::{PredicateSelect, VariableNames};

/// Decides which variables of the wrapped table a view exposes.
pub trait SelectClause: Send + Sync + fmt::Debug {
    /// Returns true if the variable is exposed.
    fn selects(&self, variable: &Variable) -> bool;
}

/// Decides which rows of the wrapped table a view exposes.
pub trait WhereClause: Send + Sync + fmt::Debug {
    /// Returns true if the row is exposed.
    ///
    /// `table` is the table the row belongs to, so that the clause can read
    /// the row's values.
    fn accepts(&self, table: &dyn ValueTable, value_set: &Arc<dyn ValueSet>) -> TesseraResult<bool>;

    /// Returns true if the row is exposed by `view`, which wraps `table`.
    ///
    /// Clauses that depend on the view, such as its exposed variables,
    /// override this. The view must not be asked for its rows from here.
    fn accepts_in_view(
        &self,
        _view: &dyn ValueTable,
        table: &dyn ValueTable,
        value_set: &Arc<dyn ValueSet>,
    ) -> TesseraResult<bool> {
        self.accepts(table, value_set)
    }
}

/// Produces the derived variables of a view.
pub trait ListClause: Send + Sync + fmt::Debug {
    /// Returns the sources of the derived variables, in exposure order,
    /// bound to the table they compute from.
    fn sources(&self, table: &TableRef) -> TesseraResult<Vec<Arc<dyn VariableValueSource>>>;
}

/// Variable selection of a view.
#[derive(Debug, Clone)]
pub enum Select {
    /// Every variable.
    All,
    /// No variable.
    None,
    /// Variables accepted by a clause.
    Predicate(Arc<dyn SelectClause>),
}

impl Select {
    /// Wraps a clause.
    pub fn predicate(clause: impl SelectClause + 'static) -> Self {
        Self::Predicate(Arc::new(clause))
    }

    /// Returns true if the variable is exposed.
    pub fn selects(&self, variable: &Variable) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Predicate(clause) => clause.selects(variable),
        }
    }
}

impl Default for Select {
    fn default() -> Self {
        Self::All
    }
}

/// Row filter of a view.
#[derive(Debug, Clone)]
pub enum Where {
    /// Every row.
    All,
    /// No row.
    None,
    /// Rows accepted by a clause.
    Predicate(Arc<dyn WhereClause>),
}

impl Where {
    /// Wraps a clause.
    pub fn predicate(clause: impl WhereClause + 'static) -> Self {
        Self::Predicate(Arc::new(clause))
    }

    /// Returns true if the row is exposed.
    pub fn accepts(
        &self,
        table: &dyn ValueTable,
        value_set: &Arc<dyn ValueSet>,
    ) -> TesseraResult<bool> {
        match self {
            Self::All => Ok(true),
            Self::None => Ok(false),
            Self::Predicate(clause) => clause.accepts(table, value_set),
        }
    }

    /// Returns true if the row of `table` is exposed by `view`.
    pub fn accepts_in_view(
        &self,
        view: &dyn ValueTable,
        table: &dyn ValueTable,
        value_set: &Arc<dyn ValueSet>,
    ) -> TesseraResult<bool> {
        match self {
            Self::All => Ok(true),
            Self::None => Ok(false),
            Self::Predicate(clause) => clause.accepts_in_view(view, table, value_set),
        }
    }

    /// Returns true for the accept-everything filter.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Returns true for the reject-everything filter.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl Default for Where {
    fn default() -> Self {
        Self::All
    }
}

/// Where a view's columns come from.
#[derive(Debug, Clone)]
pub enum ColumnClause {
    /// A selection of the wrapped table's variables.
    Projected(Select),
    /// Variables derived by a List clause.
    Derived(Arc<dyn ListClause>),
}

impl ColumnClause {
    /// Derived columns from a clause.
    pub fn derived(clause: impl ListClause + 'static) -> Self {
        Self::Derived(Arc::new(clause))
    }
}

impl Default for ColumnClause {
    fn default() -> Self {
        Self::Projected(Select::All)
    }
}
