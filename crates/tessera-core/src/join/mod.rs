//! Join tables.
//!
//! A [`JoinTable`] is the virtual union of member tables sharing one entity
//! type: its entities are the union of the members' entities, its
//! variables the union of their variables. A variable defined by several
//! members must have the same key (name, value type, repeatable flag) in
//! each; otherwise every schema access fails with the same
//! `SchemaConflict`.
//!
//! The variable analysis runs on first schema access and is published once,
//! fully built. A member failing during the analysis leaves the join
//! unanalyzed, so a later access retries.

mod analysis;
mod source;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tessera_common::config::TesseraConfig;
use tessera_common::error::{SchemaConflict, TesseraError, TesseraResult};
use tessera_common::types::{Entity, Timestamps, Value};
use tessera_common::DEFAULT_ENTITY_CAPACITY;
use tracing::debug;

use crate::table::{TableRef, ValueSet, ValueTable, VariableValueSource};
use crate::variable::Variable;

pub use analysis::{AnalyzedVariable, VariableAnalysis};
pub use source::{JoinValueSet, JoinVariableValueSource};

type AnalysisOutcome = Result<Arc<VariableAnalysis>, SchemaConflict>;

/// A virtual union of tables of one entity type.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera_common::types::{Value, ValueType};
/// use tessera_core::join::JoinTable;
/// use tessera_core::memory::MemoryTable;
/// use tessera_core::table::ValueTable;
/// use tessera_core::variable::Variable;
///
/// let a = MemoryTable::builder("A", "Participant")
///     .variable(Variable::new("x", ValueType::Integer, "Participant"))
///     .build();
/// a.insert("1", [("x", Value::integer(1))]).unwrap();
/// let b = MemoryTable::builder("B", "Participant").build();
/// b.insert("2", Vec::<(&str, Value)>::new()).unwrap();
///
/// let join = JoinTable::new(vec![Arc::new(a), Arc::new(b)], true).unwrap();
/// assert_eq!(join.variable_entity_count().unwrap(), 2);
/// assert!(join.has_variable("x"));
/// ```
#[derive(Debug)]
pub struct JoinTable {
    name: String,
    entity_type: String,
    tables: Arc<[TableRef]>,
    analysis: OnceLock<AnalysisOutcome>,
    /// Serializes the first analysis.
    analysis_guard: Mutex<()>,
    sources: RwLock<HashMap<String, Arc<JoinVariableValueSource>>>,
    /// Size of the last entity union, to pre-size the next one.
    last_entity_count: AtomicUsize,
}

impl JoinTable {
    /// Creates a join over `tables`, named after its members.
    ///
    /// With `validate`, every member must have the first member's entity
    /// type.
    pub fn new(tables: Vec<TableRef>, validate: bool) -> TesseraResult<Self> {
        let first = tables
            .first()
            .ok_or_else(|| TesseraError::invalid_argument("a join needs at least one table"))?;
        let entity_type = first.entity_type().to_string();

        if validate {
            if let Some(other) = tables.iter().find(|t| t.entity_type() != entity_type) {
                return Err(TesseraError::EntityTypeMismatch {
                    expected: entity_type,
                    actual: other.entity_type().to_string(),
                    table: other.reference(),
                });
            }
        }

        let name = tables
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join("-");
        Ok(Self {
            name,
            entity_type,
            tables: tables.into(),
            analysis: OnceLock::new(),
            analysis_guard: Mutex::new(()),
            sources: RwLock::new(HashMap::new()),
            last_entity_count: AtomicUsize::new(0),
        })
    }

    /// Creates a join validating entity types as configured.
    pub fn with_config(tables: Vec<TableRef>, config: &TesseraConfig) -> TesseraResult<Self> {
        Self::new(tables, config.join.validate_entity_type)
    }

    /// Renames the join.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the member tables, in member order.
    pub fn tables(&self) -> &[TableRef] {
        &self.tables
    }

    /// Returns the variable analysis, running it on first call.
    pub fn analysis(&self) -> TesseraResult<Arc<VariableAnalysis>> {
        if let Some(outcome) = self.analysis.get() {
            return outcome.clone().map_err(TesseraError::from);
        }
        let _guard = self.analysis_guard.lock();
        if let Some(outcome) = self.analysis.get() {
            return outcome.clone().map_err(TesseraError::from);
        }

        let outcome = VariableAnalysis::analyze(&self.name, &self.tables)?.map(Arc::new);
        match &outcome {
            Ok(analysis) => debug!(
                join = %self.name,
                members = self.tables.len(),
                variables = analysis.len(),
                "Join variable analysis complete"
            ),
            Err(conflict) => debug!(join = %self.name, %conflict, "Join variable analysis failed"),
        }
        self.analysis
            .get_or_init(|| outcome)
            .clone()
            .map_err(TesseraError::from)
    }

    fn analyzed(&self, name: &str) -> TesseraResult<AnalyzedVariable> {
        self.analysis()?
            .get(name)
            .cloned()
            .ok_or_else(|| TesseraError::no_such_variable(self.name.as_str(), name))
    }

    /// Returns the join-bound source of a variable, resolved once per name.
    pub fn join_variable_value_source(
        &self,
        name: &str,
    ) -> TesseraResult<Arc<JoinVariableValueSource>> {
        if let Some(source) = self.sources.read().get(name) {
            return Ok(Arc::clone(source));
        }
        let analyzed = self.analyzed(name)?;
        let owners = analyzed
            .owners
            .iter()
            .map(|&index| (index, Arc::clone(&self.tables[index])))
            .collect();
        let source = Arc::new(JoinVariableValueSource::new(
            analyzed.variable,
            Arc::clone(&self.tables),
            owners,
        ));
        Ok(Arc::clone(
            self.sources
                .write()
                .entry(name.to_string())
                .or_insert(source),
        ))
    }

    fn row(&self, entity: &Entity) -> JoinValueSet {
        JoinValueSet::new(entity.clone(), self.name.clone(), Arc::clone(&self.tables))
    }
}

impl ValueTable for JoinTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn variables(&self) -> TesseraResult<Vec<Variable>> {
        Ok(self
            .analysis()?
            .variables()
            .map(|analyzed| analyzed.variable.clone())
            .collect())
    }

    /// Returns the first member's definition of the variable.
    fn variable(&self, name: &str) -> TesseraResult<Variable> {
        Ok(self.analyzed(name)?.variable)
    }

    fn variable_value_source(&self, name: &str) -> TesseraResult<Arc<dyn VariableValueSource>> {
        Ok(self.join_variable_value_source(name)?)
    }

    fn variable_entities(&self) -> TesseraResult<Vec<Entity>> {
        let capacity = match self.last_entity_count.load(Ordering::Relaxed) {
            0 => DEFAULT_ENTITY_CAPACITY,
            n => n,
        };
        let mut seen = HashSet::with_capacity(capacity);
        let mut entities = Vec::with_capacity(capacity);
        for table in self.tables.iter() {
            for entity in table.variable_entities()? {
                if seen.insert(entity.clone()) {
                    entities.push(entity);
                }
            }
        }
        self.last_entity_count
            .store(entities.len(), Ordering::Relaxed);
        Ok(entities)
    }

    fn has_value_set(&self, entity: &Entity) -> TesseraResult<bool> {
        for table in self.tables.iter() {
            if table.has_value_set(entity)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn value_set(&self, entity: &Entity) -> TesseraResult<Arc<dyn ValueSet>> {
        if !self.has_value_set(entity)? {
            return Err(TesseraError::no_such_row(self.name.as_str(), entity));
        }
        Ok(Arc::new(self.row(entity)))
    }

    /// Fetches each member's rows in one call per member, covering only the
    /// requested entities that member has.
    fn value_sets(&self, entities: &[Entity]) -> TesseraResult<Vec<Arc<dyn ValueSet>>> {
        let requested: HashSet<&Entity> = entities.iter().collect();
        let mut grouped: HashMap<Entity, source::InnerRows> =
            HashMap::with_capacity(requested.len());

        for (index, table) in self.tables.iter().enumerate() {
            let present: Vec<Entity> = table
                .variable_entities()?
                .into_iter()
                .filter(|e| requested.contains(e))
                .collect();
            if present.is_empty() {
                continue;
            }
            for row in table.value_sets(&present)? {
                grouped
                    .entry(row.entity().clone())
                    .or_default()
                    .push((index, row));
            }
        }
        debug!(
            join = %self.name,
            requested = entities.len(),
            found = grouped.len(),
            "Batched join rows"
        );

        entities
            .iter()
            .map(|entity| {
                let rows = grouped
                    .get(entity)
                    .cloned()
                    .ok_or_else(|| TesseraError::no_such_row(self.name.as_str(), entity))?;
                Ok(Arc::new(JoinValueSet::with_inner_rows(
                    entity.clone(),
                    self.name.clone(),
                    Arc::clone(&self.tables),
                    rows,
                )) as Arc<dyn ValueSet>)
            })
            .collect()
    }

    fn value(&self, variable: &Variable, value_set: &dyn ValueSet) -> TesseraResult<Value> {
        self.join_variable_value_source(variable.name())?.value(value_set)
    }

    fn timestamps(&self) -> TesseraResult<Timestamps> {
        let mut timestamps = Timestamps::UNKNOWN;
        for table in self.tables.iter() {
            timestamps = timestamps.union(table.timestamps()?);
        }
        Ok(timestamps)
    }

    /// Union of the timestamps of the members having the entity.
    fn value_set_timestamps(&self, entity: &Entity) -> TesseraResult<Timestamps> {
        let mut found = false;
        let mut timestamps = Timestamps::UNKNOWN;
        for table in self.tables.iter() {
            if table.has_value_set(entity)? {
                found = true;
                timestamps = timestamps.union(table.value_set_timestamps(entity)?);
            }
        }
        if !found {
            return Err(TesseraError::no_such_row(self.name.as_str(), entity));
        }
        Ok(timestamps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTable;
    use tessera_common::types::{Timestamp, ValueType};

    fn var(name: &str, value_type: ValueType) -> Variable {
        Variable::new(name, value_type, "Participant")
    }

    fn members() -> (Arc<MemoryTable>, Arc<MemoryTable>) {
        let a = MemoryTable::builder("A", "Participant")
            .variable(var("x", ValueType::Integer))
            .variable(var("s", ValueType::Text))
            .build();
        a.insert("1", [("x", Value::integer(10)), ("s", Value::text("a1"))])
            .unwrap();
        a.insert("2", [("x", Value::integer(20)), ("s", Value::text("a2"))])
            .unwrap();

        let b = MemoryTable::builder("B", "Participant")
            .variable(var("s", ValueType::Text))
            .build();
        b.insert("2", [("s", Value::text("b2"))]).unwrap();
        b.insert("3", [("s", Value::text("b3"))]).unwrap();

        (Arc::new(a), Arc::new(b))
    }

    fn join(a: &Arc<MemoryTable>, b: &Arc<MemoryTable>) -> JoinTable {
        JoinTable::new(vec![a.clone(), b.clone()], true).unwrap()
    }

    fn entity(id: &str) -> Entity {
        Entity::new("Participant", id)
    }

    #[test]
    fn test_entity_union() {
        let (a, b) = members();
        let j = join(&a, &b);
        let ids: Vec<_> = j
            .variable_entities()
            .unwrap()
            .iter()
            .map(|e| e.identifier().to_string())
            .collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(j.name(), "A-B");
        assert_eq!(j.tables().len(), 2);
    }

    #[test]
    fn test_values() {
        let (a, b) = members();
        let j = join(&a, &b);
        let x = j.variable("x").unwrap();
        let s = j.variable("s").unwrap();

        let row2 = j.value_set(&entity("2")).unwrap();
        assert_eq!(j.value(&x, &*row2).unwrap(), Value::integer(20));
        assert_eq!(
            j.value(&s, &*row2).unwrap(),
            Value::sequence(ValueType::Text, vec![Value::text("a2"), Value::text("b2")])
        );

        let row3 = j.value_set(&entity("3")).unwrap();
        assert_eq!(j.value(&x, &*row3).unwrap(), ValueType::Integer.null_value());
        assert_eq!(j.value(&s, &*row3).unwrap(), Value::text("b3"));
    }

    #[test]
    fn test_missing_row_and_variable() {
        let (a, b) = members();
        let j = join(&a, &b);
        assert!(matches!(
            j.value_set(&entity("9")),
            Err(TesseraError::NoSuchRow { .. })
        ));
        assert!(matches!(
            j.variable("nope"),
            Err(TesseraError::NoSuchVariable { .. })
        ));
        assert!(matches!(
            j.value_set_timestamps(&entity("9")),
            Err(TesseraError::NoSuchRow { .. })
        ));
    }

    #[test]
    fn test_entity_type_validation() {
        let (a, _) = members();
        let other: TableRef = Arc::new(MemoryTable::builder("S", "Sample").build());

        let err = JoinTable::new(vec![a.clone(), other.clone()], true).unwrap_err();
        assert!(matches!(err, TesseraError::EntityTypeMismatch { .. }));
        assert!(JoinTable::new(vec![a, other], false).is_ok());
        assert!(JoinTable::new(Vec::new(), true).is_err());
    }

    #[test]
    fn test_conflict_replayed() {
        let a: TableRef = Arc::new(
            MemoryTable::builder("A", "Participant")
                .variable(var("y", ValueType::Integer))
                .build(),
        );
        let b: TableRef = Arc::new(
            MemoryTable::builder("B", "Participant")
                .variable(var("y", ValueType::Text))
                .build(),
        );
        let j = JoinTable::new(vec![a, b], true).unwrap();

        let first = j.variables().unwrap_err().to_string();
        let second = j.variable("y").unwrap_err().to_string();
        let third = j.variable_value_source("y").unwrap_err().to_string();
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn test_sources_resolved_once() {
        let (a, b) = members();
        let j = join(&a, &b);
        let first = j.join_variable_value_source("s").unwrap();
        let second = j.join_variable_value_source("s").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.tables().count(), 2);

        let other = join(&a, &b);
        assert_eq!(*first, *other.join_variable_value_source("s").unwrap());
        assert_ne!(*first, *j.join_variable_value_source("x").unwrap());
    }

    #[test]
    fn test_batch_matches_single() {
        let (a, b) = members();
        let j = join(&a, &b);
        let entities = j.variable_entities().unwrap();
        let batched = j.value_sets(&entities).unwrap();

        for (entity, batched_row) in entities.iter().zip(&batched) {
            let single_row = j.value_set(entity).unwrap();
            for var in j.variables().unwrap() {
                assert_eq!(
                    j.value(&var, &**batched_row).unwrap(),
                    j.value(&var, &*single_row).unwrap()
                );
            }
        }
        assert_eq!(a.fetch_stats().batched(), 1);
        assert_eq!(b.fetch_stats().batched(), 1);
    }

    #[test]
    fn test_batch_unknown_entity() {
        let (a, b) = members();
        let j = join(&a, &b);
        assert!(matches!(
            j.value_sets(&[entity("1"), entity("9")]),
            Err(TesseraError::NoSuchRow { .. })
        ));
    }

    #[test]
    fn test_row_timestamps_union() {
        let a = MemoryTable::builder("A", "Participant").build();
        let b = MemoryTable::builder("B", "Participant").build();
        let c = MemoryTable::builder("C", "Participant").build();
        let ts = |c, u| {
            Timestamps::new(Some(Timestamp::from_micros(c)), Some(Timestamp::from_micros(u)))
        };
        a.insert_at("1", Vec::<(&str, Value)>::new(), ts(5, 8)).unwrap();
        b.insert_at("1", Vec::<(&str, Value)>::new(), ts(3, 6)).unwrap();
        c.insert_at("2", Vec::<(&str, Value)>::new(), ts(1, 1)).unwrap();
        let j = JoinTable::new(vec![Arc::new(a), Arc::new(b), Arc::new(c)], true).unwrap();

        let expected = ts(3, 8);
        assert_eq!(j.value_set_timestamps(&entity("1")).unwrap(), expected);
        assert_eq!(j.value_set(&entity("1")).unwrap().timestamps().unwrap(), expected);
    }

    #[test]
    fn test_lazy_rows() {
        let (a, b) = members();
        let j = join(&a, &b);
        let row = j.value_set(&entity("2")).unwrap();
        let join_row = row.join_row(&j.tables).unwrap();
        assert!(!join_row.is_loaded());

        let s = j.variable("s").unwrap();
        j.value(&s, &*row).unwrap();
        assert!(join_row.is_loaded());
    }

    #[test]
    fn test_source_reads_rows_of_other_join() {
        let (a, b) = members();
        let ab = join(&a, &b);
        let ba = JoinTable::new(vec![b.clone(), a.clone()], true).unwrap();
        let row = ba.value_set(&entity("2")).unwrap();
        assert!(row.join_row(&ab.tables).is_none());

        let x = ab.variable_value_source("x").unwrap();
        let s = ab.variable_value_source("s").unwrap();
        assert_eq!(x.value(&*row).unwrap(), Value::integer(20));
        assert_eq!(
            s.value(&*row).unwrap(),
            Value::sequence(ValueType::Text, vec![Value::text("a2"), Value::text("b2")])
        );
    }
}
