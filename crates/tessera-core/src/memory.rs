//! In-memory physical tables.
//!
//! [`MemoryTable`] keeps its rows in a map guarded by a read-write lock and
//! implements the full table contract, including a batched row fetch. Every
//! write advances the table's last update, so derived tables can detect
//! that their cached entity lists went stale.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tessera_common::error::{TesseraError, TesseraResult};
use tessera_common::types::{Entity, Timestamp, Timestamps, Value};

use crate::table::{ValueSet, ValueTable, VariableValueSource};
use crate::variable::Variable;

/// Counts row fetches, to observe batching.
#[derive(Debug, Default)]
pub struct FetchStats {
    /// Calls fetching one row.
    single: AtomicU64,
    /// Calls fetching many rows at once.
    batched: AtomicU64,
}

impl FetchStats {
    /// Returns the number of single-row fetches.
    pub fn single(&self) -> u64 {
        self.single.load(Ordering::Relaxed)
    }

    /// Returns the number of batched fetches.
    pub fn batched(&self) -> u64 {
        self.batched.load(Ordering::Relaxed)
    }

    /// Resets both counters.
    pub fn reset(&self) {
        self.single.store(0, Ordering::Relaxed);
        self.batched.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct MemoryRow {
    values: HashMap<String, Value>,
    timestamps: Timestamps,
}

#[derive(Debug)]
struct MemoryData {
    variables: Vec<Variable>,
    /// Entities in insertion order.
    order: Vec<Entity>,
    rows: HashMap<Entity, MemoryRow>,
    timestamps: Timestamps,
}

impl MemoryData {
    fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name() == name)
    }

    /// Returns an instant strictly after the table's last update.
    fn next_instant(&self, at_least: Option<Timestamp>) -> Timestamp {
        let floor = self.timestamps.last_update.max(at_least);
        let now = Timestamp::now();
        match floor {
            Some(last) if last >= now => Timestamp::from_micros(last.as_micros() + 1),
            _ => now,
        }
    }
}

/// Builder for [`MemoryTable`].
#[derive(Debug)]
pub struct MemoryTableBuilder {
    name: String,
    entity_type: String,
    datasource: Option<String>,
    variables: Vec<Variable>,
    created: Option<Timestamp>,
}

impl MemoryTableBuilder {
    /// Sets the datasource the table belongs to.
    #[must_use]
    pub fn datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }

    /// Adds a variable; its index is its position in the table.
    #[must_use]
    pub fn variable(mut self, variable: Variable) -> Self {
        let index = self.variables.len();
        self.variables.push(variable.with_index(index));
        self
    }

    /// Adds several variables.
    #[must_use]
    pub fn variables(self, variables: impl IntoIterator<Item = Variable>) -> Self {
        variables.into_iter().fold(self, Self::variable)
    }

    /// Sets the creation instant. Defaults to now.
    #[must_use]
    pub fn created(mut self, created: Timestamp) -> Self {
        self.created = Some(created);
        self
    }

    /// Builds the table.
    pub fn build(self) -> MemoryTable {
        let created = self.created.unwrap_or_else(Timestamp::now);
        MemoryTable {
            name: self.name,
            entity_type: self.entity_type,
            datasource: self.datasource,
            data: Arc::new(RwLock::new(MemoryData {
                variables: self.variables,
                order: Vec::new(),
                rows: HashMap::new(),
                timestamps: Timestamps::at(created),
            })),
            fetches: Arc::new(FetchStats::default()),
        }
    }
}

/// A physical table held in memory.
///
/// # Example
///
/// ```rust
/// use tessera_common::types::{Value, ValueType};
/// use tessera_core::memory::MemoryTable;
/// use tessera_core::table::ValueTable;
/// use tessera_core::variable::Variable;
///
/// let table = MemoryTable::builder("Participants", "Participant")
///     .datasource("cohort")
///     .variable(Variable::new("AGE", ValueType::Integer, "Participant"))
///     .build();
/// table.insert("1", [("AGE", Value::integer(42))]).unwrap();
///
/// assert_eq!(table.reference(), "cohort.Participants");
/// assert_eq!(table.variable_entity_count().unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    entity_type: String,
    datasource: Option<String>,
    data: Arc<RwLock<MemoryData>>,
    fetches: Arc<FetchStats>,
}

impl MemoryTable {
    /// Starts building a table.
    pub fn builder(name: impl Into<String>, entity_type: impl Into<String>) -> MemoryTableBuilder {
        MemoryTableBuilder {
            name: name.into(),
            entity_type: entity_type.into(),
            datasource: None,
            variables: Vec::new(),
            created: None,
        }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.data.read().order.len()
    }

    /// Returns true if the table has no row.
    pub fn is_empty(&self) -> bool {
        self.data.read().order.is_empty()
    }

    /// Returns the fetch counters.
    pub fn fetch_stats(&self) -> &FetchStats {
        &self.fetches
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts or replaces the row of an entity, stamped now.
    ///
    /// Variables without a value read as null.
    pub fn insert<I, S>(&self, identifier: &str, values: I) -> TesseraResult<Entity>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        self.write_row(identifier, values, None)
    }

    /// Inserts or replaces the row of an entity with explicit row
    /// timestamps. The table's last update still advances.
    pub fn insert_at<I, S>(
        &self,
        identifier: &str,
        values: I,
        timestamps: Timestamps,
    ) -> TesseraResult<Entity>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        self.write_row(identifier, values, Some(timestamps))
    }

    /// Removes the row of an entity. Returns false if there was none.
    pub fn remove(&self, identifier: &str) -> bool {
        let entity = Entity::new(self.entity_type.clone(), identifier);
        let mut data = self.data.write();
        if data.rows.remove(&entity).is_none() {
            return false;
        }
        data.order.retain(|e| e != &entity);
        let instant = data.next_instant(None);
        data.timestamps.last_update = Some(instant);
        true
    }

    fn write_row<I, S>(
        &self,
        identifier: &str,
        values: I,
        timestamps: Option<Timestamps>,
    ) -> TesseraResult<Entity>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let entity = Entity::new(self.entity_type.clone(), identifier);
        let mut data = self.data.write();

        let mut row_values = HashMap::new();
        for (name, value) in values {
            let name = name.into();
            let variable = data
                .variable(&name)
                .ok_or_else(|| TesseraError::no_such_variable(self.reference(), name.as_str()))?;
            check_value(variable, &value)?;
            row_values.insert(name, value);
        }

        let instant = data.next_instant(timestamps.and_then(|ts| ts.last_update));
        let row_timestamps = match (timestamps, data.rows.get(&entity)) {
            (Some(ts), _) => ts,
            (None, Some(existing)) => Timestamps::new(existing.timestamps.created, Some(instant)),
            (None, None) => Timestamps::at(instant),
        };

        let previous = data.rows.insert(
            entity.clone(),
            MemoryRow {
                values: row_values,
                timestamps: row_timestamps,
            },
        );
        if previous.is_none() {
            data.order.push(entity.clone());
        }
        data.timestamps.last_update = Some(instant);
        Ok(entity)
    }

    fn row_handle(&self, data: &MemoryData, entity: &Entity) -> TesseraResult<Arc<dyn ValueSet>> {
        let row = data
            .rows
            .get(entity)
            .ok_or_else(|| TesseraError::no_such_row(self.reference(), entity))?;
        Ok(Arc::new(MemoryValueSet {
            entity: entity.clone(),
            reference: self.reference(),
            timestamps: row.timestamps,
        }))
    }
}

fn check_value(variable: &Variable, value: &Value) -> TesseraResult<()> {
    if value.value_type() != variable.value_type() {
        return Err(TesseraError::invalid_argument(format!(
            "value of type {} for variable {}",
            value.value_type(),
            variable
        )));
    }
    if variable.is_repeatable() != value.is_sequence() && !value.is_null() {
        return Err(TesseraError::invalid_argument(format!(
            "variable {} expects {}",
            variable,
            if variable.is_repeatable() {
                "a sequence"
            } else {
                "a single value"
            }
        )));
    }
    Ok(())
}

impl ValueTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn datasource_name(&self) -> Option<&str> {
        self.datasource.as_deref()
    }

    fn variables(&self) -> TesseraResult<Vec<Variable>> {
        Ok(self.data.read().variables.clone())
    }

    fn variable(&self, name: &str) -> TesseraResult<Variable> {
        self.data
            .read()
            .variable(name)
            .cloned()
            .ok_or_else(|| TesseraError::no_such_variable(self.reference(), name))
    }

    fn variable_value_source(&self, name: &str) -> TesseraResult<Arc<dyn VariableValueSource>> {
        let variable = self.variable(name)?;
        Ok(Arc::new(MemoryValueSource {
            variable,
            reference: self.reference(),
            data: Arc::clone(&self.data),
        }))
    }

    fn variable_entities(&self) -> TesseraResult<Vec<Entity>> {
        Ok(self.data.read().order.clone())
    }

    fn variable_entity_count(&self) -> TesseraResult<usize> {
        Ok(self.len())
    }

    fn has_value_set(&self, entity: &Entity) -> TesseraResult<bool> {
        Ok(self.data.read().rows.contains_key(entity))
    }

    fn value_set(&self, entity: &Entity) -> TesseraResult<Arc<dyn ValueSet>> {
        self.fetches.single.fetch_add(1, Ordering::Relaxed);
        self.row_handle(&self.data.read(), entity)
    }

    fn value_sets(&self, entities: &[Entity]) -> TesseraResult<Vec<Arc<dyn ValueSet>>> {
        self.fetches.batched.fetch_add(1, Ordering::Relaxed);
        let data = self.data.read();
        entities.iter().map(|e| self.row_handle(&data, e)).collect()
    }

    fn timestamps(&self) -> TesseraResult<Timestamps> {
        Ok(self.data.read().timestamps)
    }

    fn value_set_timestamps(&self, entity: &Entity) -> TesseraResult<Timestamps> {
        self.data
            .read()
            .rows
            .get(entity)
            .map(|row| row.timestamps)
            .ok_or_else(|| TesseraError::no_such_row(self.reference(), entity))
    }
}

/// Row handle of a [`MemoryTable`]; values are read on demand.
#[derive(Debug)]
struct MemoryValueSet {
    entity: Entity,
    reference: String,
    timestamps: Timestamps,
}

impl ValueSet for MemoryValueSet {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn table_reference(&self) -> &str {
        &self.reference
    }

    fn timestamps(&self) -> TesseraResult<Timestamps> {
        Ok(self.timestamps)
    }
}

#[derive(Debug)]
struct MemoryValueSource {
    variable: Variable,
    reference: String,
    data: Arc<RwLock<MemoryData>>,
}

impl VariableValueSource for MemoryValueSource {
    fn variable(&self) -> &Variable {
        &self.variable
    }

    fn value(&self, value_set: &dyn ValueSet) -> TesseraResult<Value> {
        let data = self.data.read();
        let row = data
            .rows
            .get(value_set.entity())
            .ok_or_else(|| TesseraError::no_such_row(self.reference.as_str(), value_set.entity()))?;
        Ok(row
            .values
            .get(self.variable.name())
            .cloned()
            .unwrap_or_else(|| self.variable.null_value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_common::types::ValueType;

    fn table() -> MemoryTable {
        MemoryTable::builder("T", "Participant")
            .datasource("ds")
            .variable(Variable::new("AGE", ValueType::Integer, "Participant"))
            .variable(Variable::new("MED", ValueType::Text, "Participant").repeatable(true))
            .build()
    }

    #[test]
    fn test_insert_and_read() {
        let t = table();
        let e = t.insert("1", [("AGE", Value::integer(30))]).unwrap();

        let row = t.value_set(&e).unwrap();
        let age = t.variable("AGE").unwrap();
        let med = t.variable("MED").unwrap();
        assert_eq!(t.value(&age, &*row).unwrap(), Value::integer(30));
        assert_eq!(t.value(&med, &*row).unwrap(), ValueType::Text.null_sequence());
        assert_eq!(row.table_reference(), "ds.T");
        assert_eq!(med.index(), 1);
    }

    #[test]
    fn test_insertion_order_kept() {
        let t = table();
        for id in ["3", "1", "2"] {
            t.insert(id, Vec::<(&str, Value)>::new()).unwrap();
        }
        let ids: Vec<_> = t
            .variable_entities()
            .unwrap()
            .iter()
            .map(|e| e.identifier().to_string())
            .collect();
        assert_eq!(ids, ["3", "1", "2"]);
    }

    #[test]
    fn test_rejects_bad_values() {
        let t = table();
        assert!(matches!(
            t.insert("1", [("AGE", Value::text("x"))]),
            Err(TesseraError::InvalidArgument { .. })
        ));
        assert!(matches!(
            t.insert("1", [("MED", Value::text("x"))]),
            Err(TesseraError::InvalidArgument { .. })
        ));
        assert!(matches!(
            t.insert("1", [("NOPE", Value::integer(1))]),
            Err(TesseraError::NoSuchVariable { .. })
        ));
        assert!(t.is_empty());
    }

    #[test]
    fn test_every_write_advances_last_update() {
        let t = table();
        let before = t.timestamps().unwrap().last_update;
        t.insert("1", [("AGE", Value::integer(1))]).unwrap();
        let after_insert = t.timestamps().unwrap().last_update;
        assert!(after_insert > before);

        assert!(t.remove("1"));
        assert!(t.timestamps().unwrap().last_update > after_insert);
        assert!(!t.remove("1"));
    }

    #[test]
    fn test_insert_at_keeps_row_timestamps() {
        let t = table();
        let ts = Timestamps::new(Some(Timestamp::from_micros(3)), Some(Timestamp::from_micros(10)));
        let e = t.insert_at("1", [("AGE", Value::integer(1))], ts).unwrap();

        assert_eq!(t.value_set_timestamps(&e).unwrap(), ts);
        assert!(t.timestamps().unwrap().last_update >= Some(Timestamp::from_micros(10)));
    }

    #[test]
    fn test_missing_row() {
        let t = table();
        let err = t.value_set(&Entity::new("Participant", "9")).unwrap_err();
        assert!(matches!(err, TesseraError::NoSuchRow { .. }));
        assert!(!t.has_value_set(&Entity::new("Participant", "9")).unwrap());
    }

    #[test]
    fn test_fetch_stats() {
        let t = table();
        let a = t.insert("1", [("AGE", Value::integer(1))]).unwrap();
        let b = t.insert("2", [("AGE", Value::integer(2))]).unwrap();

        let rows = t.value_sets(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(rows[0].entity(), &b);
        assert_eq!(t.fetch_stats().batched(), 1);
        assert_eq!(t.fetch_stats().single(), 0);

        t.value_set(&a).unwrap();
        assert_eq!(t.fetch_stats().single(), 1);
        t.fetch_stats().reset();
        assert_eq!(t.fetch_stats().batched(), 0);
    }
}
