//! Join rows and value sources.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tessera_common::error::TesseraResult;
use tessera_common::types::{Entity, Timestamps, Value};

use crate::table::{same_table, TableRef, ValueSet, VariableValueSource};
use crate::variable::{JoinVariableKey, Variable};

/// Member rows of one join row, tagged with the member index.
pub(crate) type InnerRows = Vec<(usize, Arc<dyn ValueSet>)>;

/// A row of a join: one entity across the member tables that have it.
///
/// The member rows are looked up on first use, unless the batch fetch
/// already supplied them.
pub struct JoinValueSet {
    entity: Entity,
    reference: String,
    tables: Arc<[TableRef]>,
    inner: OnceLock<InnerRows>,
}

impl JoinValueSet {
    pub(crate) fn new(entity: Entity, reference: String, tables: Arc<[TableRef]>) -> Self {
        Self {
            entity,
            reference,
            tables,
            inner: OnceLock::new(),
        }
    }

    pub(crate) fn with_inner_rows(
        entity: Entity,
        reference: String,
        tables: Arc<[TableRef]>,
        rows: InnerRows,
    ) -> Self {
        let row = Self::new(entity, reference, tables);
        // Freshly created, so the cell is empty
        let _ = row.inner.set(rows);
        row
    }

    /// Returns true once the member rows are known.
    pub fn is_loaded(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Returns the member rows, fetching them if needed.
    pub(crate) fn inner_rows(&self) -> TesseraResult<&InnerRows> {
        if let Some(rows) = self.inner.get() {
            return Ok(rows);
        }
        let mut rows = Vec::new();
        for (index, table) in self.tables.iter().enumerate() {
            if table.has_value_set(&self.entity)? {
                rows.push((index, table.value_set(&self.entity)?));
            }
        }
        Ok(self.inner.get_or_init(|| rows))
    }

    /// Returns the row of one member, if that member has the entity.
    pub(crate) fn inner_row(&self, member: usize) -> TesseraResult<Option<&Arc<dyn ValueSet>>> {
        Ok(self
            .inner_rows()?
            .iter()
            .find(|(index, _)| *index == member)
            .map(|(_, row)| row))
    }
}

impl ValueSet for JoinValueSet {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn table_reference(&self) -> &str {
        &self.reference
    }

    /// Earliest creation and latest update over the member rows.
    fn timestamps(&self) -> TesseraResult<Timestamps> {
        let mut timestamps = Timestamps::UNKNOWN;
        for (_, row) in self.inner_rows()? {
            timestamps = timestamps.union(row.timestamps()?);
        }
        Ok(timestamps)
    }

    fn join_row(&self, members: &Arc<[TableRef]>) -> Option<&JoinValueSet> {
        Arc::ptr_eq(&self.tables, members).then_some(self)
    }
}

impl fmt::Debug for JoinValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinValueSet")
            .field("entity", &self.entity)
            .field("join", &self.reference)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Source of one join variable over the members defining it.
///
/// Two sources are equal when they compute the same variable key over the
/// same member tables.
pub struct JoinVariableValueSource {
    variable: Variable,
    key: JoinVariableKey,
    /// Member list of the join the source belongs to.
    members: Arc<[TableRef]>,
    /// Defining members with their index in the join.
    owners: Vec<(usize, TableRef)>,
}

impl JoinVariableValueSource {
    pub(crate) fn new(
        variable: Variable,
        members: Arc<[TableRef]>,
        owners: Vec<(usize, TableRef)>,
    ) -> Self {
        Self {
            key: variable.join_key(),
            variable,
            members,
            owners,
        }
    }

    /// Returns the key of the variable.
    pub fn key(&self) -> &JoinVariableKey {
        &self.key
    }

    /// Returns the member tables defining the variable, in member order.
    pub fn tables(&self) -> impl Iterator<Item = &TableRef> {
        self.owners.iter().map(|(_, table)| table)
    }

    fn collect(&self, row: &dyn ValueSet) -> TesseraResult<Vec<Value>> {
        let mut values = Vec::with_capacity(self.owners.len());
        match row.join_row(&self.members) {
            Some(join_row) => {
                for (member, table) in &self.owners {
                    if let Some(inner) = join_row.inner_row(*member)? {
                        values.push(table.value(&self.variable, &**inner)?);
                    }
                }
            }
            None => {
                for (_, table) in &self.owners {
                    if table.has_value_set(row.entity())? {
                        let inner = table.value_set(row.entity())?;
                        values.push(table.value(&self.variable, &*inner)?);
                    }
                }
            }
        }
        Ok(values)
    }
}

impl VariableValueSource for JoinVariableValueSource {
    fn variable(&self) -> &Variable {
        &self.variable
    }

    /// No defining member has the row: the variable's null value. One does:
    /// its value. Several do: a sequence of their values in member order.
    fn value(&self, value_set: &dyn ValueSet) -> TesseraResult<Value> {
        let mut values = self.collect(value_set)?;
        Ok(match values.len() {
            0 => self.variable.null_value(),
            1 => values.remove(0),
            _ => Value::sequence(self.variable.value_type(), values),
        })
    }
}

impl PartialEq for JoinVariableValueSource {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.owners.len() == other.owners.len()
            && self
                .owners
                .iter()
                .zip(&other.owners)
                .all(|((_, a), (_, b))| same_table(a, b))
    }
}

impl Eq for JoinVariableValueSource {}

impl fmt::Debug for JoinVariableValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinVariableValueSource")
            .field("key", &self.key)
            .field(
                "tables",
                &self.owners.iter().map(|(_, t)| t.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
