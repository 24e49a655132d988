//! View builder.

use std::sync::Arc;

use tessera_common::config::TesseraConfig;
use tessera_common::error::{TesseraError, TesseraResult};
use tessera_common::types::{Entity, Timestamp};
use tracing::debug;

use super::incremental::{incremental_mapping, Destination};
use super::View;
use crate::clause::{CachingWhereClause, ColumnClause, ListClause, Select, Where};
use crate::entities::{EntityCache, EntityListProvider, EntityStore};
use crate::join::JoinTable;
use crate::mapping::MappingFunction;
use crate::registry::{Registry, TableReference};
use crate::table::{TableRef, ValueTable};
use crate::transform::TransformingTable;

/// Builder for [`View`].
///
/// Several source tables are combined into a [`JoinTable`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera_common::types::{Value, ValueType};
/// use tessera_core::clause::{EntityIdWhere, Select, VariableNames, Where};
/// use tessera_core::memory::MemoryTable;
/// use tessera_core::table::ValueTable;
/// use tessera_core::variable::Variable;
/// use tessera_core::view::View;
///
/// let table = MemoryTable::builder("Participants", "Participant")
///     .variable(Variable::new("AGE", ValueType::Integer, "Participant"))
///     .variable(Variable::new("SEX", ValueType::Text, "Participant"))
///     .build();
/// table.insert("1", [("AGE", Value::integer(42))]).unwrap();
/// table.insert("2", [("AGE", Value::integer(7))]).unwrap();
///
/// let view = View::builder("Adults")
///     .from(Arc::new(table))
///     .select(Select::predicate(VariableNames::new(["AGE"])))
///     .where_clause(Where::predicate(EntityIdWhere::new(["1"])))
///     .build()
///     .unwrap();
///
/// assert_eq!(view.variables().unwrap().len(), 1);
/// assert_eq!(view.variable_entity_count().unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct ViewBuilder {
    name: String,
    datasource: Option<String>,
    sources: Vec<TableRef>,
    join: Option<Arc<JoinTable>>,
    columns: ColumnClause,
    where_clause: Where,
    created: Option<Timestamp>,
    updated: Option<Timestamp>,
    entity_mapping: Option<MappingFunction<Entity>>,
    /// Parsed when configured, resolved by the view on use.
    destination: Option<TesseraResult<Arc<Destination>>>,
    store: Option<Arc<dyn EntityStore>>,
    cache: Option<Arc<dyn EntityCache>>,
    config: TesseraConfig,
}

impl ViewBuilder {
    /// Creates a builder for a view named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datasource: None,
            sources: Vec::new(),
            join: None,
            columns: ColumnClause::default(),
            where_clause: Where::default(),
            created: None,
            updated: None,
            entity_mapping: None,
            destination: None,
            store: None,
            cache: None,
            config: TesseraConfig::default(),
        }
    }

    /// Adds a source table.
    #[must_use]
    pub fn from(mut self, table: TableRef) -> Self {
        self.sources.push(table);
        self
    }

    /// Adds several source tables.
    #[must_use]
    pub fn from_tables(mut self, tables: impl IntoIterator<Item = TableRef>) -> Self {
        self.sources.extend(tables);
        self
    }

    /// Reads from an existing join instead of source tables.
    #[must_use]
    pub fn from_join(mut self, join: Arc<JoinTable>) -> Self {
        self.join = Some(join);
        self
    }

    /// Exposes the variables of the wrapped table accepted by `select`.
    #[must_use]
    pub fn select(mut self, select: Select) -> Self {
        self.columns = ColumnClause::Projected(select);
        self
    }

    /// Exposes the variables derived by `list` instead of the wrapped
    /// table's.
    #[must_use]
    pub fn list(mut self, list: impl ListClause + 'static) -> Self {
        self.columns = ColumnClause::derived(list);
        self
    }

    /// Sets the column clause.
    #[must_use]
    pub fn columns(mut self, columns: ColumnClause) -> Self {
        self.columns = columns;
        self
    }

    /// Sets the row filter.
    #[must_use]
    pub fn where_clause(mut self, where_clause: Where) -> Self {
        self.where_clause = where_clause;
        self
    }

    /// Overrides the creation instant.
    #[must_use]
    pub fn created(mut self, created: Timestamp) -> Self {
        self.created = Some(created);
        self
    }

    /// Sets an update instant; the view reports the latest of this one and
    /// the wrapped table's.
    #[must_use]
    pub fn updated(mut self, updated: Timestamp) -> Self {
        self.updated = Some(updated);
        self
    }

    /// Renumbers entities.
    #[must_use]
    pub fn entity_mapping(mut self, mapping: MappingFunction<Entity>) -> Self {
        self.entity_mapping = Some(mapping);
        self
    }

    /// Exposes only the rows more recent in the source than in the
    /// `destination` table, a `datasource.table` reference.
    ///
    /// The destination is looked up in `registry` each time it is needed.
    /// While it is not registered it holds no row, so every row is
    /// included.
    #[must_use]
    pub fn incremental(mut self, registry: Arc<Registry>, destination: &str) -> Self {
        let parsed = destination.parse::<TableReference>().map(|reference| {
            debug!(view = %self.name, destination = %reference, "Incremental destination");
            Arc::new(Destination::new(registry, reference))
        });
        self.destination = Some(parsed);
        self
    }

    /// Keeps the entity list in an entity store.
    #[must_use]
    pub fn entity_store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Keeps the entity list in an entity cache.
    #[must_use]
    pub fn entity_cache(mut self, cache: Arc<dyn EntityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Places the view in a datasource.
    #[must_use]
    pub fn datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }

    /// Applies a configuration.
    #[must_use]
    pub fn config(mut self, config: &TesseraConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Builds the view.
    pub fn build(self) -> TesseraResult<View> {
        let (wrapped, join) = self.wrapped_table()?;

        let mut table = TransformingTable::new(self.name.clone(), Arc::clone(&wrapped));
        if let Some(datasource) = self.datasource {
            table = table.with_datasource(datasource);
        }
        let destination = match (self.destination, self.entity_mapping) {
            (Some(_), Some(_)) => {
                return Err(TesseraError::invalid_argument(format!(
                    "view '{}' cannot be incremental and have an entity mapping",
                    self.name
                )))
            }
            (Some(destination), None) => {
                let destination = destination?;
                table = table.with_entity_mapping(incremental_mapping(
                    Arc::clone(&wrapped),
                    Arc::clone(&destination),
                ));
                Some(destination)
            }
            (None, Some(mapping)) => {
                table = table.with_entity_mapping(mapping);
                None
            }
            (None, None) => None,
        };

        let derived = match &self.columns {
            ColumnClause::Derived(list) => list.sources(&wrapped)?,
            ColumnClause::Projected(_) => Vec::new(),
        };

        let where_clause = match self.where_clause {
            Where::Predicate(clause) if self.config.where_cache.enabled => Where::Predicate(
                Arc::new(CachingWhereClause::new(clause, self.config.where_cache.capacity)),
            ),
            other => other,
        };

        let provider = EntityListProvider::new(
            self.store,
            self.cache,
            self.config.entities.local_cache,
        );

        debug!(
            view = %table.reference(),
            wrapped = %wrapped.reference(),
            joined = join.is_some(),
            "Built view"
        );
        Ok(View {
            table,
            columns: self.columns,
            where_clause,
            derived,
            created: self.created,
            updated: self.updated,
            provider,
            join,
            destination,
        })
    }

    /// Returns the table the view wraps, and the join when it is one.
    fn wrapped_table(&self) -> TesseraResult<(TableRef, Option<Arc<JoinTable>>)> {
        if let Some(join) = &self.join {
            if !self.sources.is_empty() {
                return Err(TesseraError::invalid_argument(format!(
                    "view '{}' has both a join and source tables",
                    self.name
                )));
            }
            return Ok((Arc::clone(join) as TableRef, Some(Arc::clone(join))));
        }
        match self.sources.as_slice() {
            [] => Err(TesseraError::invalid_argument(format!(
                "view '{}' has no source table",
                self.name
            ))),
            [single] => Ok((Arc::clone(single), None)),
            _ => {
                let join = Arc::new(JoinTable::with_config(self.sources.clone(), &self.config)?);
                Ok((Arc::clone(&join) as TableRef, Some(join)))
            }
        }
    }
}
