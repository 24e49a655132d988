//! The table contract.
//!
//! Every table, physical or derived, implements [`ValueTable`]: a named
//! collection of entities times variables for one entity type. Rows are
//! [`ValueSet`] handles binding one entity to one table; their values are
//! fetched lazily, one variable at a time, through the table or through a
//! [`VariableValueSource`].
//!
//! Derived tables (views, joins, transforming wrappers) implement the same
//! contract over other tables, so they nest arbitrarily.

use std::fmt;
use std::sync::Arc;

use tessera_common::error::{TesseraError, TesseraResult};
use tessera_common::types::{Entity, Timestamps, Value};
use tessera_common::REFERENCE_SEPARATOR;

use crate::join::JoinValueSet;
use crate::variable::Variable;

/// Shared handle to any table.
pub type TableRef = Arc<dyn ValueTable>;

/// A row: one entity within one table.
pub trait ValueSet: Send + Sync + fmt::Debug {
    /// Returns the entity of this row.
    fn entity(&self) -> &Entity;

    /// Returns the reference of the table that owns this row.
    fn table_reference(&self) -> &str;

    /// Returns the row's creation and last update instants.
    fn timestamps(&self) -> TesseraResult<Timestamps>;

    /// Returns the inner row when this row re-exposes another table's row.
    fn wrapped(&self) -> Option<&Arc<dyn ValueSet>> {
        None
    }

    /// Returns this row as a row of the join whose member list is
    /// `members`. Rows of other tables, and of other joins, return `None`.
    fn join_row(&self, _members: &Arc<[TableRef]>) -> Option<&JoinValueSet> {
        None
    }
}

/// Computes the values of one variable.
pub trait VariableValueSource: Send + Sync + fmt::Debug {
    /// Returns the variable this source computes.
    fn variable(&self) -> &Variable;

    /// Returns the value for a row.
    fn value(&self, value_set: &dyn ValueSet) -> TesseraResult<Value>;
}

/// A table of entities times variables.
pub trait ValueTable: Send + Sync + fmt::Debug {
    /// Returns the table name.
    fn name(&self) -> &str;

    /// Returns the type of the entities this table holds.
    fn entity_type(&self) -> &str;

    /// Returns the datasource this table belongs to, if any.
    fn datasource_name(&self) -> Option<&str> {
        None
    }

    /// Returns the fully-qualified reference: `datasource.table`, or the
    /// bare name for a table outside any datasource.
    fn reference(&self) -> String {
        match self.datasource_name() {
            Some(ds) => format!("{}{}{}", ds, REFERENCE_SEPARATOR, self.name()),
            None => self.name().to_string(),
        }
    }

    /// Returns true for derived tables built by the view builder.
    fn is_view(&self) -> bool {
        false
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// Returns the variables, in table order.
    fn variables(&self) -> TesseraResult<Vec<Variable>>;

    /// Returns a variable by name.
    fn variable(&self, name: &str) -> TesseraResult<Variable> {
        self.variables()?
            .into_iter()
            .find(|v| v.name() == name)
            .ok_or_else(|| TesseraError::no_such_variable(self.reference(), name))
    }

    /// Returns true if the table exposes a variable of this name.
    ///
    /// Any failure to resolve the variable reads as absence.
    fn has_variable(&self, name: &str) -> bool {
        self.variable(name).is_ok()
    }

    /// Returns the source computing a variable's values.
    fn variable_value_source(&self, name: &str) -> TesseraResult<Arc<dyn VariableValueSource>>;

    // =========================================================================
    // Entities and Rows
    // =========================================================================

    /// Returns the entities having a row, in table order.
    fn variable_entities(&self) -> TesseraResult<Vec<Entity>>;

    /// Returns the number of entities having a row.
    fn variable_entity_count(&self) -> TesseraResult<usize> {
        Ok(self.variable_entities()?.len())
    }

    /// Returns true if the entity has a row.
    fn has_value_set(&self, entity: &Entity) -> TesseraResult<bool>;

    /// Returns the row of an entity, or `NoSuchRow`.
    fn value_set(&self, entity: &Entity) -> TesseraResult<Arc<dyn ValueSet>>;

    /// Returns the rows of several entities, in request order.
    ///
    /// Tables that can fetch many rows at once override this; the result
    /// must equal fetching the rows one at a time.
    fn value_sets(&self, entities: &[Entity]) -> TesseraResult<Vec<Arc<dyn ValueSet>>> {
        entities.iter().map(|e| self.value_set(e)).collect()
    }

    /// Returns the value of a variable for a row of this table.
    fn value(&self, variable: &Variable, value_set: &dyn ValueSet) -> TesseraResult<Value> {
        self.variable_value_source(variable.name())?.value(value_set)
    }

    // =========================================================================
    // Timestamps
    // =========================================================================

    /// Returns the table's creation and last update instants.
    fn timestamps(&self) -> TesseraResult<Timestamps>;

    /// Returns the timestamps of an entity's row.
    fn value_set_timestamps(&self, entity: &Entity) -> TesseraResult<Timestamps> {
        self.value_set(entity)?.timestamps()
    }
}

/// Returns true if both handles point at the same table.
pub fn same_table(a: &TableRef, b: &TableRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}
