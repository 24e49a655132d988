//! Views.
//!
//! A [`View`] is a read-only derived table over one wrapped table, or over a
//! join of several. It decides:
//!
//! - which columns are exposed, through a [`ColumnClause`]
//! - which rows are exposed, through a [`Where`] clause
//! - how entities are renumbered, through an entity [`MappingFunction`]
//!
//! A row is visible when its entity maps back to a wrapped entity and the
//! Where clause accepts the wrapped row. Entity lists that need a Where
//! evaluation or a join union are served by an [`EntityListProvider`].
//!
//! Views are assembled with [`ViewBuilder`].

mod builder;
mod incremental;

use std::sync::Arc;

use tessera_common::error::{TesseraError, TesseraResult};
use tessera_common::types::{Entity, Timestamp, Timestamps, Value};

use crate::clause::{ColumnClause, Select, Where};
use crate::entities::{page, EntityListProvider};
use crate::join::JoinTable;
use crate::mapping::MappingFunction;
use crate::table::{TableRef, ValueSet, ValueTable, VariableValueSource};
use crate::transform::{MappedValueSource, TransformingTable};
use crate::variable::Variable;
use incremental::Destination;

pub use builder::ViewBuilder;

/// A derived table filtering and reshaping a wrapped table.
#[derive(Debug)]
pub struct View {
    table: TransformingTable,
    columns: ColumnClause,
    where_clause: Where,
    /// Sources of the derived variables, bound to the wrapped table.
    derived: Vec<Arc<dyn VariableValueSource>>,
    created: Option<Timestamp>,
    updated: Option<Timestamp>,
    provider: EntityListProvider,
    /// The join built from, or given as, the source tables.
    join: Option<Arc<JoinTable>>,
    /// Destination of an incremental view.
    destination: Option<Arc<Destination>>,
}

impl View {
    /// Starts building a view.
    pub fn builder(name: impl Into<String>) -> ViewBuilder {
        ViewBuilder::new(name)
    }

    /// Returns the wrapped table.
    pub fn wrapped(&self) -> &TableRef {
        self.table.wrapped()
    }

    /// Returns the join the view reads from, if it reads from one.
    pub fn join(&self) -> Option<&Arc<JoinTable>> {
        self.join.as_ref()
    }

    /// Returns the column clause.
    pub fn columns(&self) -> &ColumnClause {
        &self.columns
    }

    /// Returns the Where clause.
    pub fn where_clause(&self) -> &Where {
        &self.where_clause
    }

    /// Returns the entity mapping.
    pub fn entity_mapping(&self) -> &MappingFunction<Entity> {
        self.table.entity_mapping()
    }

    /// Returns the entity list provider.
    pub fn provider(&self) -> &EntityListProvider {
        &self.provider
    }

    /// Returns `[offset, offset + limit)` of the entity list; a negative
    /// limit means "to the end".
    pub fn entities_page(&self, offset: usize, limit: i64) -> TesseraResult<Vec<Entity>> {
        if self.lists_directly() {
            return Ok(page(&self.wrapped().variable_entities()?, offset, limit).to_vec());
        }
        self.provider.page(
            &self.reference(),
            self.freshness()?,
            offset,
            limit,
            || self.compute_entities(),
        )
    }

    /// Drops the cached entity list so that the next read recomputes it.
    pub fn invalidate_entities(&self) -> TesseraResult<()> {
        self.provider.invalidate(&self.reference())
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// True when listing entities filters nothing, so the wrapped table's
    /// own list can be returned as is.
    fn lists_directly(&self) -> bool {
        self.where_clause.is_all()
            && self.entity_mapping().is_identity()
            && self.join.as_ref().map_or(true, |join| join.tables().len() == 1)
    }

    /// Freshness tag of the entity list: the wrapped table's last update,
    /// or the later of it and the destination's for an incremental view.
    ///
    /// An unregistered destination gives no tag, so that its registration
    /// is seen by the next listing.
    fn freshness(&self) -> TesseraResult<Option<Timestamp>> {
        let wrapped = self.wrapped().timestamps()?.last_update;
        let Some(destination) = &self.destination else {
            return Ok(wrapped);
        };
        match (wrapped, destination.last_update()?) {
            (Some(wrapped), Some(written)) => Ok(Some(wrapped.max(written))),
            _ => Ok(None),
        }
    }

    /// Lists the visible entities in wrapped table order.
    fn compute_entities(&self) -> TesseraResult<Vec<Entity>> {
        if self.where_clause.is_none() {
            return Ok(Vec::new());
        }
        let inner = self.wrapped().variable_entities()?;
        let accepted: Vec<&Entity> = match &self.where_clause {
            Where::Predicate(_) => {
                let rows = self.wrapped().value_sets(&inner)?;
                let mut accepted = Vec::with_capacity(inner.len());
                for (entity, row) in inner.iter().zip(&rows) {
                    if self.accepts(row)? {
                        accepted.push(entity);
                    }
                }
                accepted
            }
            _ => inner.iter().collect(),
        };

        // Only entities that map back to the same row are visible
        let round_trips = !self.entity_mapping().is_identity();
        let mut entities = Vec::with_capacity(accepted.len());
        for entity in accepted {
            let Some(outer) = self.table.outer_entity(entity)? else {
                continue;
            };
            if !round_trips || self.table.inner_entity(&outer)?.as_ref() == Some(entity) {
                entities.push(outer);
            }
        }
        Ok(entities)
    }

    /// Maps an outer entity to the wrapped entity, or `NoSuchRow`.
    fn inner_entity(&self, entity: &Entity) -> TesseraResult<Entity> {
        self.table
            .inner_entity(entity)?
            .ok_or_else(|| self.no_such_row(entity))
    }

    /// Fetches the wrapped row, reporting a missing one as missing here.
    fn wrapped_row(&self, outer: &Entity, inner: &Entity) -> TesseraResult<Arc<dyn ValueSet>> {
        match self.wrapped().value_set(inner) {
            Err(TesseraError::NoSuchRow { .. }) => Err(self.no_such_row(outer)),
            other => other,
        }
    }

    fn accepts(&self, row: &Arc<dyn ValueSet>) -> TesseraResult<bool> {
        self.where_clause.accepts_in_view(self, &**self.wrapped(), row)
    }

    fn no_such_row(&self, entity: &Entity) -> TesseraError {
        TesseraError::no_such_row(self.reference(), entity)
    }

    // =========================================================================
    // Variables
    // =========================================================================

    fn derived_source(&self, name: &str) -> Option<&Arc<dyn VariableValueSource>> {
        self.derived.iter().find(|s| s.variable().name() == name)
    }

    fn no_such_variable(&self, name: &str) -> TesseraError {
        TesseraError::no_such_variable(self.reference(), name)
    }

    /// Returns the selected variable of the wrapped table.
    fn projected_variable(&self, select: &Select, name: &str) -> TesseraResult<Variable> {
        let variable = match self.table.variable(name) {
            Err(TesseraError::NoSuchVariable { .. }) => return Err(self.no_such_variable(name)),
            other => other?,
        };
        if !select.selects(&variable) {
            return Err(self.no_such_variable(name));
        }
        Ok(variable)
    }
}

impl ValueTable for View {
    fn name(&self) -> &str {
        self.table.name()
    }

    fn entity_type(&self) -> &str {
        self.table.entity_type()
    }

    fn datasource_name(&self) -> Option<&str> {
        self.table.datasource_name()
    }

    fn reference(&self) -> String {
        self.table.reference()
    }

    fn is_view(&self) -> bool {
        true
    }

    fn variables(&self) -> TesseraResult<Vec<Variable>> {
        match &self.columns {
            ColumnClause::Projected(Select::None) => Ok(Vec::new()),
            ColumnClause::Projected(select) => Ok(self
                .table
                .variables()?
                .into_iter()
                .filter(|v| select.selects(v))
                .collect()),
            ColumnClause::Derived(_) => Ok(self
                .derived
                .iter()
                .map(|s| s.variable().clone())
                .collect()),
        }
    }

    fn variable(&self, name: &str) -> TesseraResult<Variable> {
        match &self.columns {
            ColumnClause::Projected(select) => self.projected_variable(select, name),
            ColumnClause::Derived(_) => self
                .derived_source(name)
                .map(|s| s.variable().clone())
                .ok_or_else(|| self.no_such_variable(name)),
        }
    }

    fn variable_value_source(&self, name: &str) -> TesseraResult<Arc<dyn VariableValueSource>> {
        match &self.columns {
            ColumnClause::Projected(select) => {
                self.projected_variable(select, name)?;
                self.table.variable_value_source(name)
            }
            ColumnClause::Derived(_) => {
                let source = self
                    .derived_source(name)
                    .ok_or_else(|| self.no_such_variable(name))?;
                Ok(Arc::new(MappedValueSource::new(
                    source.variable().clone(),
                    Arc::clone(source),
                    self.table.resolver().clone(),
                )))
            }
        }
    }

    fn variable_entities(&self) -> TesseraResult<Vec<Entity>> {
        if self.lists_directly() {
            return self.wrapped().variable_entities();
        }
        let entities = self
            .provider
            .entities(&self.reference(), self.freshness()?, || self.compute_entities())?;
        Ok(Vec::clone(&entities))
    }

    fn variable_entity_count(&self) -> TesseraResult<usize> {
        if self.lists_directly() {
            return self.wrapped().variable_entity_count();
        }
        self.provider
            .count(&self.reference(), self.freshness()?, || self.compute_entities())
    }

    fn has_value_set(&self, entity: &Entity) -> TesseraResult<bool> {
        if self.where_clause.is_none() {
            return Ok(false);
        }
        let Some(inner) = self.table.inner_entity(entity)? else {
            return Ok(false);
        };
        if !self.wrapped().has_value_set(&inner)? {
            return Ok(false);
        }
        if self.where_clause.is_all() {
            return Ok(true);
        }
        let row = self.wrapped().value_set(&inner)?;
        self.accepts(&row)
    }

    fn value_set(&self, entity: &Entity) -> TesseraResult<Arc<dyn ValueSet>> {
        if self.where_clause.is_none() {
            return Err(self.no_such_row(entity));
        }
        let inner = self.inner_entity(entity)?;
        let row = self.wrapped_row(entity, &inner)?;
        if !self.accepts(&row)? {
            return Err(self.no_such_row(entity));
        }
        Ok(self.table.wrap_value_set(entity.clone(), row))
    }

    /// Fetches the wrapped rows in one call, then filters them.
    fn value_sets(&self, entities: &[Entity]) -> TesseraResult<Vec<Arc<dyn ValueSet>>> {
        if self.where_clause.is_none() {
            return match entities.first() {
                Some(first) => Err(self.no_such_row(first)),
                None => Ok(Vec::new()),
            };
        }
        let inner = entities
            .iter()
            .map(|e| self.inner_entity(e))
            .collect::<TesseraResult<Vec<_>>>()?;
        let rows = self.wrapped().value_sets(&inner)?;

        let mut value_sets = Vec::with_capacity(rows.len());
        for (entity, row) in entities.iter().zip(rows) {
            if !self.accepts(&row)? {
                return Err(self.no_such_row(entity));
            }
            value_sets.push(self.table.wrap_value_set(entity.clone(), row));
        }
        Ok(value_sets)
    }

    fn value(&self, variable: &Variable, value_set: &dyn ValueSet) -> TesseraResult<Value> {
        match &self.columns {
            ColumnClause::Projected(select) => {
                if !select.selects(variable) {
                    return Err(self.no_such_variable(variable.name()));
                }
                self.table.value(variable, value_set)
            }
            ColumnClause::Derived(_) => {
                let source = self
                    .derived_source(variable.name())
                    .ok_or_else(|| self.no_such_variable(variable.name()))?;
                let row = self.table.inner_value_set(value_set)?;
                source.value(&*row)
            }
        }
    }

    /// Own creation instant if set, else the wrapped table's; the latest
    /// of the own and the wrapped last update.
    fn timestamps(&self) -> TesseraResult<Timestamps> {
        let wrapped = self.wrapped().timestamps()?;
        Ok(Timestamps::new(
            self.created.or(wrapped.created),
            self.updated.max(wrapped.last_update),
        ))
    }

    fn value_set_timestamps(&self, entity: &Entity) -> TesseraResult<Timestamps> {
        if !self.has_value_set(entity)? {
            return Err(self.no_such_row(entity));
        }
        let inner = self.inner_entity(entity)?;
        self.wrapped().value_set_timestamps(&inner)
    }
}
