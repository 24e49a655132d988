//! Transforming table wrapper.
//!
//! [`TransformingTable`] re-exposes a wrapped table, forwarding every call
//! except where a [`MappingFunction`] substitutes entity identity or
//! variable names. Rows it returns report the wrapper as their owner and
//! keep a handle on the wrapped row, which is what value lookups unwrap.
//!
//! Views are built on top of this wrapper; it is also usable on its own to
//! rename variables or recode entity identifiers.

use std::sync::Arc;

use tessera_common::error::{TesseraError, TesseraResult};
use tessera_common::types::{Entity, Timestamps, Value};
use tessera_common::REFERENCE_SEPARATOR;

use crate::mapping::MappingFunction;
use crate::table::{TableRef, ValueSet, ValueTable, VariableValueSource};
use crate::variable::Variable;

/// A row of a derived table, wrapping the row of the table underneath.
#[derive(Debug)]
pub struct TransformedValueSet {
    entity: Entity,
    reference: String,
    inner: Arc<dyn ValueSet>,
}

impl TransformedValueSet {
    /// Wraps an inner row under an outer entity and owner.
    pub fn new(entity: Entity, reference: impl Into<String>, inner: Arc<dyn ValueSet>) -> Self {
        Self {
            entity,
            reference: reference.into(),
            inner,
        }
    }

    /// Returns the wrapped row.
    pub fn inner(&self) -> &Arc<dyn ValueSet> {
        &self.inner
    }
}

impl ValueSet for TransformedValueSet {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn table_reference(&self) -> &str {
        &self.reference
    }

    fn timestamps(&self) -> TesseraResult<Timestamps> {
        self.inner.timestamps()
    }

    fn wrapped(&self) -> Option<&Arc<dyn ValueSet>> {
        Some(&self.inner)
    }
}

/// Turns outer rows back into rows of the wrapped table.
///
/// Shared by the wrapper and by the value sources it hands out, which
/// outlive any borrow of the wrapper itself.
#[derive(Debug, Clone)]
pub(crate) struct RowResolver {
    reference: String,
    wrapped: TableRef,
    entities: MappingFunction<Entity>,
}

impl RowResolver {
    /// Returns the inner row for an outer row.
    ///
    /// Rows this table handed out carry their inner row. Any other row is
    /// resolved through its entity.
    pub(crate) fn inner_row(&self, row: &dyn ValueSet) -> TesseraResult<Arc<dyn ValueSet>> {
        if row.table_reference() == self.reference {
            if let Some(inner) = row.wrapped() {
                return Ok(Arc::clone(inner));
            }
        }
        let inner = self
            .entities
            .unapply(row.entity())?
            .ok_or_else(|| TesseraError::no_such_row(self.reference.as_str(), row.entity()))?;
        self.wrapped.value_set(&inner)
    }
}

/// A variable source of the wrapped table, re-exposed under the outer
/// variable and fed with unwrapped rows.
#[derive(Debug)]
pub(crate) struct MappedValueSource {
    variable: Variable,
    inner: Arc<dyn VariableValueSource>,
    resolver: RowResolver,
}

impl MappedValueSource {
    pub(crate) fn new(
        variable: Variable,
        inner: Arc<dyn VariableValueSource>,
        resolver: RowResolver,
    ) -> Self {
        Self {
            variable,
            inner,
            resolver,
        }
    }
}

impl VariableValueSource for MappedValueSource {
    fn variable(&self) -> &Variable {
        &self.variable
    }

    fn value(&self, value_set: &dyn ValueSet) -> TesseraResult<Value> {
        let inner = self.resolver.inner_row(value_set)?;
        self.inner.value(&*inner)
    }
}

/// A table forwarding to another table through entity and variable
/// mappings.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera_common::types::{Value, ValueType};
/// use tessera_core::memory::MemoryTable;
/// use tessera_core::table::ValueTable;
/// use tessera_core::transform::TransformingTable;
/// use tessera_core::variable::Variable;
///
/// let table = MemoryTable::builder("T", "Participant")
///     .variable(Variable::new("AGE", ValueType::Integer, "Participant"))
///     .build();
/// table.insert("1", [("AGE", Value::integer(42))]).unwrap();
///
/// let renamed = TransformingTable::renamed("T1", Arc::new(table), "T1_");
/// assert!(renamed.has_variable("T1_AGE"));
/// assert!(!renamed.has_variable("AGE"));
/// ```
#[derive(Debug)]
pub struct TransformingTable {
    name: String,
    datasource: Option<String>,
    resolver: RowResolver,
    variables: MappingFunction<String>,
}

impl TransformingTable {
    /// Wraps a table under a new name with identity mappings.
    pub fn new(name: impl Into<String>, wrapped: TableRef) -> Self {
        let name = name.into();
        Self {
            resolver: RowResolver {
                reference: name.clone(),
                wrapped,
                entities: MappingFunction::identity(),
            },
            name,
            datasource: None,
            variables: MappingFunction::identity(),
        }
    }

    /// Wraps a table, exposing every variable under a name prefix.
    pub fn renamed(name: impl Into<String>, wrapped: TableRef, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let strip = prefix.clone();
        Self::new(name, wrapped).with_variable_mapping(MappingFunction::infallible(
            move |inner: &String| Some(format!("{}{}", prefix, inner)),
            move |outer: &String| outer.strip_prefix(strip.as_str()).map(str::to_string),
        ))
    }

    /// Places the table in a datasource.
    #[must_use]
    pub fn with_datasource(mut self, datasource: impl Into<String>) -> Self {
        let datasource = datasource.into();
        self.resolver.reference = format!("{}{}{}", datasource, REFERENCE_SEPARATOR, self.name);
        self.datasource = Some(datasource);
        self
    }

    /// Replaces the entity mapping.
    #[must_use]
    pub fn with_entity_mapping(mut self, entities: MappingFunction<Entity>) -> Self {
        self.resolver.entities = entities;
        self
    }

    /// Replaces the variable name mapping.
    #[must_use]
    pub fn with_variable_mapping(mut self, variables: MappingFunction<String>) -> Self {
        self.variables = variables;
        self
    }

    /// Returns the wrapped table.
    pub fn wrapped(&self) -> &TableRef {
        &self.resolver.wrapped
    }

    /// Returns the entity mapping.
    pub fn entity_mapping(&self) -> &MappingFunction<Entity> {
        &self.resolver.entities
    }

    /// Returns the variable name mapping.
    pub fn variable_mapping(&self) -> &MappingFunction<String> {
        &self.variables
    }

    /// Maps an outer entity to the wrapped table's entity.
    pub fn inner_entity(&self, outer: &Entity) -> TesseraResult<Option<Entity>> {
        self.resolver.entities.unapply(outer)
    }

    /// Maps a wrapped table's entity to the outer entity.
    pub fn outer_entity(&self, inner: &Entity) -> TesseraResult<Option<Entity>> {
        self.resolver.entities.apply(inner)
    }

    /// Returns the wrapped table's row for an outer row.
    pub fn inner_value_set(&self, row: &dyn ValueSet) -> TesseraResult<Arc<dyn ValueSet>> {
        self.resolver.inner_row(row)
    }

    /// Re-exposes a wrapped table's row under an outer entity.
    pub fn wrap_value_set(&self, outer: Entity, inner: Arc<dyn ValueSet>) -> Arc<dyn ValueSet> {
        Arc::new(TransformedValueSet::new(
            outer,
            self.resolver.reference.as_str(),
            inner,
        ))
    }

    pub(crate) fn resolver(&self) -> &RowResolver {
        &self.resolver
    }

    /// Lists outer entities: wrapped entities mapped outward, kept only
    /// where `visible` holds for the outer entity.
    pub fn variable_entities_filtered<F>(&self, mut visible: F) -> TesseraResult<Vec<Entity>>
    where
        F: FnMut(&Entity) -> TesseraResult<bool>,
    {
        let inner = self.wrapped().variable_entities()?;
        let mut entities = Vec::with_capacity(inner.len());
        for entity in &inner {
            if let Some(outer) = self.outer_entity(entity)? {
                if visible(&outer)? {
                    entities.push(outer);
                }
            }
        }
        Ok(entities)
    }

    /// Maps an outer variable name to the wrapped table's name.
    fn inner_variable_name(&self, name: &str) -> TesseraResult<String> {
        self.variables
            .unapply(&name.to_string())?
            .ok_or_else(|| TesseraError::no_such_variable(self.resolver.reference.as_str(), name))
    }

    fn outer_variable(&self, inner: &Variable) -> TesseraResult<Option<Variable>> {
        if self.variables.is_identity() {
            return Ok(Some(inner.clone()));
        }
        let name = self.variables.apply(&inner.name().to_string())?;
        Ok(name.map(|name| inner.renamed(name)))
    }
}

impl ValueTable for TransformingTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        self.wrapped().entity_type()
    }

    fn datasource_name(&self) -> Option<&str> {
        self.datasource.as_deref()
    }

    fn reference(&self) -> String {
        self.resolver.reference.clone()
    }

    fn variables(&self) -> TesseraResult<Vec<Variable>> {
        let mut variables = Vec::new();
        for inner in self.wrapped().variables()? {
            if let Some(outer) = self.outer_variable(&inner)? {
                variables.push(outer);
            }
        }
        Ok(variables)
    }

    fn variable(&self, name: &str) -> TesseraResult<Variable> {
        let inner = self.wrapped().variable(&self.inner_variable_name(name)?)?;
        Ok(inner.renamed(name))
    }

    fn variable_value_source(&self, name: &str) -> TesseraResult<Arc<dyn VariableValueSource>> {
        let inner_name = self.inner_variable_name(name)?;
        let inner = self.wrapped().variable_value_source(&inner_name)?;
        let variable = inner.variable().renamed(name);
        Ok(Arc::new(MappedValueSource::new(
            variable,
            inner,
            self.resolver.clone(),
        )))
    }

    fn variable_entities(&self) -> TesseraResult<Vec<Entity>> {
        if self.entity_mapping().is_identity() {
            return self.wrapped().variable_entities();
        }
        self.variable_entities_filtered(|e| self.has_value_set(e))
    }

    fn has_value_set(&self, entity: &Entity) -> TesseraResult<bool> {
        match self.inner_entity(entity)? {
            Some(inner) => self.wrapped().has_value_set(&inner),
            None => Ok(false),
        }
    }

    fn value_set(&self, entity: &Entity) -> TesseraResult<Arc<dyn ValueSet>> {
        let inner = self
            .inner_entity(entity)?
            .ok_or_else(|| TesseraError::no_such_row(self.reference(), entity))?;
        let row = self.wrapped().value_set(&inner)?;
        Ok(self.wrap_value_set(entity.clone(), row))
    }

    fn value_sets(&self, entities: &[Entity]) -> TesseraResult<Vec<Arc<dyn ValueSet>>> {
        let inner = entities
            .iter()
            .map(|e| {
                self.inner_entity(e)?
                    .ok_or_else(|| TesseraError::no_such_row(self.reference(), e))
            })
            .collect::<TesseraResult<Vec<_>>>()?;
        let rows = self.wrapped().value_sets(&inner)?;
        Ok(entities
            .iter()
            .zip(rows)
            .map(|(outer, row)| self.wrap_value_set(outer.clone(), row))
            .collect())
    }

    fn value(&self, variable: &Variable, value_set: &dyn ValueSet) -> TesseraResult<Value> {
        let inner_variable = self
            .wrapped()
            .variable(&self.inner_variable_name(variable.name())?)?;
        let row = self.inner_value_set(value_set)?;
        self.wrapped().value(&inner_variable, &*row)
    }

    fn timestamps(&self) -> TesseraResult<Timestamps> {
        self.wrapped().timestamps()
    }

    fn value_set_timestamps(&self, entity: &Entity) -> TesseraResult<Timestamps> {
        let inner = self
            .inner_entity(entity)?
            .ok_or_else(|| TesseraError::no_such_row(self.reference(), entity))?;
        self.wrapped().value_set_timestamps(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTable;
    use tessera_common::types::ValueType;

    fn source() -> Arc<MemoryTable> {
        let table = MemoryTable::builder("T", "Participant")
            .datasource("ds")
            .variable(Variable::new("AGE", ValueType::Integer, "Participant"))
            .variable(Variable::new("SEX", ValueType::Text, "Participant"))
            .build();
        table
            .insert("1", [("AGE", Value::integer(30)), ("SEX", Value::text("F"))])
            .unwrap();
        table
            .insert("2", [("AGE", Value::integer(40)), ("SEX", Value::text("M"))])
            .unwrap();
        Arc::new(table)
    }

    fn recoded(wrapped: TableRef) -> TransformingTable {
        TransformingTable::new("Recoded", wrapped).with_entity_mapping(MappingFunction::infallible(
            |inner: &Entity| Some(inner.with_identifier(format!("P{}", inner.identifier()))),
            |outer: &Entity| {
                outer
                    .identifier()
                    .strip_prefix('P')
                    .map(|id| outer.with_identifier(id))
            },
        ))
    }

    #[test]
    fn test_identity_wrapper_matches_wrapped() {
        let inner = source();
        let wrapper = TransformingTable::new("W", inner.clone()).with_datasource("other");

        assert_eq!(wrapper.reference(), "other.W");
        assert_eq!(
            wrapper.variable_entities().unwrap(),
            inner.variable_entities().unwrap()
        );
        let age = wrapper.variable("AGE").unwrap();
        for e in inner.variable_entities().unwrap() {
            let row = wrapper.value_set(&e).unwrap();
            assert_eq!(row.table_reference(), "other.W");
            assert_eq!(
                wrapper.value(&age, &*row).unwrap(),
                inner.value(&age, &*inner.value_set(&e).unwrap()).unwrap()
            );
        }
    }

    #[test]
    fn test_entity_recoding() {
        let wrapper = recoded(source());

        let ids: Vec<_> = wrapper
            .variable_entities()
            .unwrap()
            .into_iter()
            .map(|e| e.identifier().to_string())
            .collect();
        assert_eq!(ids, ["P1", "P2"]);

        let outer = Entity::new("Participant", "P2");
        let row = wrapper.value_set(&outer).unwrap();
        assert_eq!(row.entity(), &outer);
        let sex = wrapper.variable("SEX").unwrap();
        assert_eq!(wrapper.value(&sex, &*row).unwrap(), Value::text("M"));
    }

    #[test]
    fn test_unmappable_entity() {
        let wrapper = recoded(source());
        let raw = Entity::new("Participant", "1");

        assert!(!wrapper.has_value_set(&raw).unwrap());
        assert!(matches!(
            wrapper.value_set(&raw),
            Err(TesseraError::NoSuchRow { .. })
        ));
        assert!(matches!(
            wrapper.value_sets(&[raw]),
            Err(TesseraError::NoSuchRow { .. })
        ));
    }

    #[test]
    fn test_renamed_variables() {
        let inner = source();
        let wrapper = TransformingTable::renamed("R", inner, "T1_");

        let names: Vec<_> = wrapper
            .variables()
            .unwrap()
            .into_iter()
            .map(|v| v.name().to_string())
            .collect();
        assert_eq!(names, ["T1_AGE", "T1_SEX"]);
        assert!(matches!(
            wrapper.variable("AGE"),
            Err(TesseraError::NoSuchVariable { .. })
        ));

        let source = wrapper.variable_value_source("T1_AGE").unwrap();
        let row = wrapper.value_set(&Entity::new("Participant", "1")).unwrap();
        assert_eq!(source.variable().name(), "T1_AGE");
        assert_eq!(source.value(&*row).unwrap(), Value::integer(30));
    }

    #[test]
    fn test_batched_rows_go_through_wrapped_batch() {
        let inner = source();
        let wrapper = recoded(inner.clone());
        let entities = [Entity::new("Participant", "P2"), Entity::new("Participant", "P1")];

        let rows = wrapper.value_sets(&entities).unwrap();
        assert_eq!(rows[0].entity(), &entities[0]);
        assert_eq!(rows[1].wrapped().unwrap().entity().identifier(), "1");
        assert_eq!(inner.fetch_stats().batched(), 1);
        assert_eq!(inner.fetch_stats().single(), 0);
    }

    #[test]
    fn test_foreign_row_is_resolved_by_entity() {
        let inner = source();
        let wrapper = TransformingTable::new("W", inner.clone());
        let age = wrapper.variable("AGE").unwrap();
        let foreign = inner.value_set(&Entity::new("Participant", "2")).unwrap();

        assert_eq!(wrapper.value(&age, &*foreign).unwrap(), Value::integer(40));
    }
}
