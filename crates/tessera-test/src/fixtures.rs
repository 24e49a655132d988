//! Sample tables and instrumented collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tessera_common::error::{TesseraError, TesseraResult};
use tessera_common::types::{Entity, Timestamp, Timestamps, Value, ValueType};
use tessera_core::memory::MemoryTable;
use tessera_core::registry::{MemoryDatasource, Registry};
use tessera_core::table::{TableRef, ValueSet, ValueTable, VariableValueSource};
use tessera_core::variable::Variable;

/// Entity type of every fixture table.
pub const PARTICIPANT: &str = "Participant";

/// Returns a participant entity.
pub fn participant(id: &str) -> Entity {
    Entity::new(PARTICIPANT, id)
}

/// Returns the identifiers of a list of entities.
pub fn identifiers(entities: &[Entity]) -> Vec<String> {
    entities.iter().map(|e| e.identifier().to_string()).collect()
}

/// Returns a participant variable.
pub fn variable(name: &str, value_type: ValueType) -> Variable {
    Variable::new(name, value_type, PARTICIPANT)
}

/// Builds the `cohort.Participants` table:
///
/// | id | AGE | SEX | DIAGNOSES (repeatable) |
/// |----|-----|-----|------------------------|
/// | 1  | 34  | F   | [asthma]               |
/// | 2  | 58  | M   | [diabetes, gout]       |
/// | 3  | 71  | F   | null                   |
/// | 4  | 19  | M   | []                     |
pub fn participants() -> Arc<MemoryTable> {
    let table = MemoryTable::builder("Participants", PARTICIPANT)
        .datasource("cohort")
        .variable(variable("AGE", ValueType::Integer))
        .variable(variable("SEX", ValueType::Text))
        .variable(variable("DIAGNOSES", ValueType::Text).repeatable(true))
        .build();

    let rows: [(&str, i64, &str, Value); 4] = [
        ("1", 34, "F", texts(&["asthma"])),
        ("2", 58, "M", texts(&["diabetes", "gout"])),
        ("3", 71, "F", ValueType::Text.null_sequence()),
        ("4", 19, "M", texts(&[])),
    ];
    for (id, age, sex, diagnoses) in rows {
        table
            .insert(
                id,
                [
                    ("AGE", Value::integer(age)),
                    ("SEX", Value::text(sex)),
                    ("DIAGNOSES", diagnoses),
                ],
            )
            .expect("fixture row");
    }
    Arc::new(table)
}

fn texts(values: &[&str]) -> Value {
    Value::sequence(
        ValueType::Text,
        values.iter().map(|v| Value::text(*v)).collect(),
    )
}

/// Builds a table whose single integer variable `variable_name` holds
/// `value_of(id)` for every identifier.
pub fn integer_table(
    name: &str,
    variable_name: &str,
    ids: &[&str],
    value_of: impl Fn(&str) -> i64,
) -> Arc<MemoryTable> {
    let table = MemoryTable::builder(name, PARTICIPANT)
        .datasource("cohort")
        .variable(variable(variable_name, ValueType::Integer))
        .build();
    for id in ids {
        table
            .insert(id, [(variable_name, Value::integer(value_of(id)))])
            .expect("fixture row");
    }
    Arc::new(table)
}

/// Builds a table without variables whose rows carry fixed timestamps,
/// `(id, last update in microseconds)`.
pub fn stamped_table(name: &str, rows: &[(&str, u64)]) -> Arc<MemoryTable> {
    let table = MemoryTable::builder(name, PARTICIPANT).build();
    for (id, micros) in rows {
        table
            .insert_at(
                id,
                Vec::<(&str, Value)>::new(),
                Timestamps::at(Timestamp::from_micros(*micros)),
            )
            .expect("fixture row");
    }
    Arc::new(table)
}

/// Builds a shared registry holding one memory datasource per
/// `(name, tables)`.
pub fn registry(datasources: Vec<(&str, Vec<TableRef>)>) -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    for (name, tables) in datasources {
        let datasource = MemoryDatasource::new(name);
        for table in tables {
            datasource.add_table(table).expect("fixture table");
        }
        registry
            .register(Arc::new(datasource))
            .expect("fixture datasource");
    }
    registry
}

// =============================================================================
// Instrumented Tables
// =============================================================================

/// Failure reported by [`FailingTable`].
#[derive(Debug, thiserror::Error)]
#[error("table '{table}' is unavailable")]
pub struct Unavailable {
    /// The failing table.
    pub table: String,
}

/// A physical table whose storage is unreachable: every data access fails
/// with [`Unavailable`].
#[derive(Debug)]
pub struct FailingTable {
    name: String,
}

impl FailingTable {
    /// Creates a failing table.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn fail<T>(&self) -> TesseraResult<T> {
        Err(TesseraError::collaborator(Unavailable {
            table: self.name.clone(),
        }))
    }
}

impl ValueTable for FailingTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        PARTICIPANT
    }

    fn variables(&self) -> TesseraResult<Vec<Variable>> {
        self.fail()
    }

    fn variable_value_source(&self, _name: &str) -> TesseraResult<Arc<dyn VariableValueSource>> {
        self.fail()
    }

    fn variable_entities(&self) -> TesseraResult<Vec<Entity>> {
        self.fail()
    }

    fn has_value_set(&self, _entity: &Entity) -> TesseraResult<bool> {
        self.fail()
    }

    fn value_set(&self, _entity: &Entity) -> TesseraResult<Arc<dyn ValueSet>> {
        self.fail()
    }

    fn timestamps(&self) -> TesseraResult<Timestamps> {
        self.fail()
    }
}

/// Forwards to a table, counting value lookups.
#[derive(Debug)]
pub struct CountingTable {
    inner: TableRef,
    values: AtomicUsize,
}

impl CountingTable {
    /// Wraps a table.
    pub fn new(inner: TableRef) -> Self {
        Self {
            inner,
            values: AtomicUsize::new(0),
        }
    }

    /// Returns the number of value lookups so far.
    pub fn value_lookups(&self) -> usize {
        self.values.load(Ordering::SeqCst)
    }
}

impl ValueTable for CountingTable {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn entity_type(&self) -> &str {
        self.inner.entity_type()
    }

    fn datasource_name(&self) -> Option<&str> {
        self.inner.datasource_name()
    }

    fn variables(&self) -> TesseraResult<Vec<Variable>> {
        self.inner.variables()
    }

    fn variable_value_source(&self, name: &str) -> TesseraResult<Arc<dyn VariableValueSource>> {
        self.inner.variable_value_source(name)
    }

    fn variable_entities(&self) -> TesseraResult<Vec<Entity>> {
        self.inner.variable_entities()
    }

    fn has_value_set(&self, entity: &Entity) -> TesseraResult<bool> {
        self.inner.has_value_set(entity)
    }

    fn value_set(&self, entity: &Entity) -> TesseraResult<Arc<dyn ValueSet>> {
        self.inner.value_set(entity)
    }

    fn value_sets(&self, entities: &[Entity]) -> TesseraResult<Vec<Arc<dyn ValueSet>>> {
        self.inner.value_sets(entities)
    }

    fn value(&self, variable: &Variable, value_set: &dyn ValueSet) -> TesseraResult<Value> {
        self.values.fetch_add(1, Ordering::SeqCst);
        self.inner.value(variable, value_set)
    }

    fn timestamps(&self) -> TesseraResult<Timestamps> {
        self.inner.timestamps()
    }

    fn value_set_timestamps(&self, entity: &Entity) -> TesseraResult<Timestamps> {
        self.inner.value_set_timestamps(entity)
    }
}
