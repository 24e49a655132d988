//! Incremental entity mapping.
//!
//! An incremental view exposes only the rows of its source that changed
//! since they were last written to a destination table. A row is included
//! when either last update is unknown, when the destination has no row for
//! the entity, or when the source row is more recent than the destination
//! row.
//!
//! The destination is looked up in the registry on every decision, so a
//! destination registered after the view was built is taken into account.

use std::sync::Arc;

use tessera_common::error::TesseraResult;
use tessera_common::types::{Entity, Timestamp};
use tracing::trace;

use crate::mapping::MappingFunction;
use crate::registry::{Registry, TableReference};
use crate::table::TableRef;

/// Destination table of an incremental view, resolved on use.
#[derive(Debug)]
pub(crate) struct Destination {
    registry: Arc<Registry>,
    reference: TableReference,
}

impl Destination {
    pub(crate) fn new(registry: Arc<Registry>, reference: TableReference) -> Self {
        Self {
            registry,
            reference,
        }
    }

    /// Returns the destination table, or `None` when it is not registered.
    pub(crate) fn resolve(&self) -> TesseraResult<Option<TableRef>> {
        match self.registry.table(&self.reference) {
            Ok(table) => Ok(Some(table)),
            Err(e) if e.is_not_found() => {
                trace!(destination = %self.reference, "Destination not registered");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Last update of the destination, `None` when it is missing or unknown.
    pub(crate) fn last_update(&self) -> TesseraResult<Option<Timestamp>> {
        match self.resolve()? {
            Some(table) => Ok(table.timestamps()?.last_update),
            None => Ok(None),
        }
    }
}

/// Decides whether one entity is included.
#[derive(Debug)]
struct Freshness {
    source: TableRef,
    destination: Arc<Destination>,
}

impl Freshness {
    fn includes(&self, entity: &Entity) -> TesseraResult<bool> {
        let source = self.source.value_set_timestamps(entity)?.last_update;
        let Some(source) = source else {
            trace!(%entity, "Included: source last update unknown");
            return Ok(true);
        };
        let Some(destination) = self.destination.resolve()? else {
            trace!(%entity, "Included: no destination table");
            return Ok(true);
        };
        if !destination.has_value_set(entity)? {
            trace!(%entity, "Included: no destination row");
            return Ok(true);
        }
        let include = match destination.value_set_timestamps(entity)?.last_update {
            Some(written) => source > written,
            None => true,
        };
        trace!(%entity, include, "Compared with destination row");
        Ok(include)
    }
}

/// Builds the entity mapping of an incremental view over `source`.
///
/// Both directions keep the entity unchanged and apply the same inclusion
/// rule. The inverse direction also rejects entities the source does not
/// have, so that row lookups on the view see them as absent.
pub(crate) fn incremental_mapping(
    source: TableRef,
    destination: Arc<Destination>,
) -> MappingFunction<Entity> {
    let forward = Arc::new(Freshness {
        source,
        destination,
    });
    let inverse = Arc::clone(&forward);

    MappingFunction::new(
        move |inner: &Entity| {
            Ok(forward.includes(inner)?.then(|| inner.clone()))
        },
        move |outer: &Entity| {
            if !inverse.source.has_value_set(outer)? {
                return Ok(None);
            }
            Ok(inverse.includes(outer)?.then(|| outer.clone()))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTable;
    use crate::registry::MemoryDatasource;
    use tessera_common::types::{Timestamps, Value};
    use crate::view::tests::entity;

    fn at(micros: u64) -> Timestamps {
        Timestamps::at(Timestamp::from_micros(micros))
    }

    fn table(name: &str, rows: &[(&str, u64)]) -> Arc<MemoryTable> {
        let table = MemoryTable::builder(name, "Participant").build();
        for (id, micros) in rows {
            table
                .insert_at(id, Vec::<(&str, Value)>::new(), at(*micros))
                .unwrap();
        }
        Arc::new(table)
    }

    /// A destination `out.D`, holding `table` when one is given.
    fn destination(table: Option<Arc<MemoryTable>>) -> (Arc<MemoryDatasource>, Arc<Destination>) {
        let registry = Arc::new(Registry::new());
        let ds = Arc::new(MemoryDatasource::new("out"));
        if let Some(table) = table {
            ds.add_table(table).unwrap();
        }
        registry.register(ds.clone()).unwrap();
        let destination = Destination::new(registry, TableReference::new("out", "D"));
        (ds, Arc::new(destination))
    }

    #[test]
    fn test_inclusion_rule() {
        let source = table("S", &[("1", 10), ("2", 10), ("3", 10)]);
        let (_ds, destination) = destination(Some(table("D", &[("1", 5), ("2", 15)])));
        let mapping = incremental_mapping(source, destination);

        assert_eq!(mapping.apply(&entity("1")).unwrap(), Some(entity("1")));
        assert_eq!(mapping.apply(&entity("2")).unwrap(), None);
        assert_eq!(mapping.apply(&entity("3")).unwrap(), Some(entity("3")));
    }

    #[test]
    fn test_equal_instants_excluded() {
        let source = table("S", &[("1", 10)]);
        let (_ds, destination) = destination(Some(table("D", &[("1", 10)])));
        let mapping = incremental_mapping(source, destination);
        assert_eq!(mapping.apply(&entity("1")).unwrap(), None);
    }

    #[test]
    fn test_unresolved_destination_includes_all() {
        let source = table("S", &[("1", 10)]);
        let (_ds, destination) = destination(None);
        let mapping = incremental_mapping(source, destination);
        assert_eq!(mapping.apply(&entity("1")).unwrap(), Some(entity("1")));
    }

    #[test]
    fn test_unknown_instants_include() {
        let source = Arc::new(MemoryTable::builder("S", "Participant").build());
        source
            .insert_at("1", Vec::<(&str, Value)>::new(), Timestamps::UNKNOWN)
            .unwrap();
        let (_ds, destination) = destination(Some(table("D", &[("1", 99)])));
        let mapping = incremental_mapping(source, destination);
        assert_eq!(mapping.apply(&entity("1")).unwrap(), Some(entity("1")));
    }

    #[test]
    fn test_inverse_rejects_missing_source_row() {
        let source = table("S", &[("1", 10)]);
        let (_ds, destination) = destination(None);
        let mapping = incremental_mapping(source, destination);
        assert_eq!(mapping.unapply(&entity("1")).unwrap(), Some(entity("1")));
        assert_eq!(mapping.unapply(&entity("9")).unwrap(), None);
    }

    #[test]
    fn test_destination_resolved_on_use() {
        let source = table("S", &[("1", 10), ("2", 10)]);
        let (ds, destination) = destination(None);
        let mapping = incremental_mapping(source, Arc::clone(&destination));
        assert_eq!(mapping.apply(&entity("1")).unwrap(), Some(entity("1")));
        assert_eq!(destination.last_update().unwrap(), None);

        ds.add_table(table("D", &[("1", 20)])).unwrap();
        assert_eq!(mapping.apply(&entity("1")).unwrap(), None);
        assert_eq!(mapping.apply(&entity("2")).unwrap(), Some(entity("2")));
        assert!(destination.last_update().unwrap().is_some());
    }
}
