//! Integration tests for entity list caching and paging.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tessera_cache::tagged::TaggedCache;
use tessera_common::types::{Entity, Timestamp, Timestamps, Value};
use tessera_common::TesseraConfig;
use tessera_core::clause::{PredicateWhere, Where};
use tessera_core::entities::{EntityCache, EntityStore, MemoryEntityStore};
use tessera_core::memory::MemoryTable;
use tessera_core::registry::MemoryDatasource;
use tessera_core::table::{TableRef, ValueTable};
use tessera_core::view::{View, ViewBuilder};
use tessera_test::fixtures::{identifiers, integer_table, participant, registry, stamped_table};

/// Rows whose `v` is even, counting evaluations.
fn even(calls: &Arc<AtomicUsize>) -> Where {
    let calls = Arc::clone(calls);
    Where::predicate(PredicateWhere::new(move |table, row| {
        calls.fetch_add(1, Ordering::SeqCst);
        let v = table.variable("v")?;
        Ok(table.value(&v, row)?.as_integer().map_or(false, |n| n % 2 == 0))
    }))
}

fn source() -> Arc<MemoryTable> {
    integer_table("Numbers", "v", &["1", "2", "3", "4"], |id| {
        id.parse().unwrap_or_default()
    })
}

fn even_view(table: &Arc<MemoryTable>, calls: &Arc<AtomicUsize>) -> ViewBuilder {
    View::builder("Evens")
        .datasource("views")
        .from(table.clone())
        .where_clause(even(calls))
}

/// After the wrapped table changes, the next read reflects the change.
fn assert_follows_updates(view: &View, table: &MemoryTable) {
    assert_eq!(identifiers(&view.variable_entities().unwrap()), ["2", "4"]);
    table.insert("6", [("v", Value::integer(6))]).unwrap();
    assert_eq!(identifiers(&view.variable_entities().unwrap()), ["2", "4", "6"]);
    table.remove("2");
    assert_eq!(identifiers(&view.variable_entities().unwrap()), ["4", "6"]);
    table.insert("4", [("v", Value::integer(5))]).unwrap();
    assert_eq!(identifiers(&view.variable_entities().unwrap()), ["6"]);
}

#[test]
fn test_local_tier_staleness() {
    let table = source();
    let calls = Arc::new(AtomicUsize::new(0));
    let view = even_view(&table, &calls).build().unwrap();

    view.variable_entities().unwrap();
    let after_first = calls.load(Ordering::SeqCst);
    assert_eq!(after_first, 4);
    view.variable_entities().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), after_first);

    assert_follows_updates(&view, &table);
}

#[test]
fn test_cache_tier_staleness() {
    let table = source();
    let calls = Arc::new(AtomicUsize::new(0));
    let cache: Arc<TaggedCache<Vec<Entity>>> = Arc::new(TaggedCache::new(16));
    let view = even_view(&table, &calls)
        .entity_cache(cache.clone())
        .build()
        .unwrap();

    view.variable_entities().unwrap();
    view.variable_entities().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let cached = EntityCache::get(&*cache, "views.Evens").unwrap().unwrap();
    assert_eq!(identifiers(&cached.entities), ["2", "4"]);
    assert!(cached.is_current(table.timestamps().unwrap().last_update));

    assert_follows_updates(&view, &table);
}

#[test]
fn test_cache_shared_between_views() {
    let table = source();
    let calls = Arc::new(AtomicUsize::new(0));
    let cache: Arc<TaggedCache<Vec<Entity>>> = Arc::new(TaggedCache::default());
    let first = even_view(&table, &calls)
        .entity_cache(cache.clone())
        .build()
        .unwrap();
    let second = even_view(&table, &calls)
        .entity_cache(cache)
        .build()
        .unwrap();

    first.variable_entities().unwrap();
    assert_eq!(second.variable_entities().unwrap().len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_store_tier() {
    let table = source();
    let calls = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(MemoryEntityStore::new());
    let view = even_view(&table, &calls)
        .entity_store(store.clone())
        .build()
        .unwrap();

    assert_eq!(view.variable_entity_count().unwrap(), 2);
    assert_eq!(identifiers(&store.list("views.Evens").unwrap()), ["2", "4"]);
    assert_eq!(identifiers(&view.entities_page(1, 5).unwrap()), ["4"]);

    // The store is filled once; refreshing it is an explicit invalidation
    table.insert("8", [("v", Value::integer(8))]).unwrap();
    view.invalidate_entities().unwrap();
    assert_eq!(identifiers(&view.variable_entities().unwrap()), ["2", "4", "8"]);
}

#[test]
fn test_local_cache_disabled() {
    let table = source();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = TesseraConfig::default();
    config.entities.local_cache = false;
    let view = even_view(&table, &calls).config(&config).build().unwrap();

    view.variable_entities().unwrap();
    view.variable_entities().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}

#[test]
fn test_shortcut_skips_caching() {
    let table = source();
    let store = Arc::new(MemoryEntityStore::new());
    let view = View::builder("Plain")
        .datasource("views")
        .from(table.clone())
        .entity_store(store.clone())
        .build()
        .unwrap();

    assert_eq!(view.variable_entity_count().unwrap(), 4);
    assert!(!store.exists("views.Plain").unwrap());
    table.insert("5", [("v", Value::integer(5))]).unwrap();
    assert_eq!(view.variable_entity_count().unwrap(), 5);
}

#[test]
fn test_paging() {
    let table = integer_table("Many", "v", &["1", "2", "3", "4", "5", "6", "7", "8"], |_| 2);
    let calls = Arc::new(AtomicUsize::new(0));
    let view = even_view(&table, &calls).build().unwrap();

    assert_eq!(identifiers(&view.entities_page(0, 3).unwrap()), ["1", "2", "3"]);
    assert_eq!(identifiers(&view.entities_page(6, 3).unwrap()), ["7", "8"]);
    assert_eq!(view.entities_page(2, -1).unwrap().len(), 6);
    assert!(view.entities_page(8, 1).unwrap().is_empty());
    assert!(view.entities_page(100, -1).unwrap().is_empty());
    assert!(view.entities_page(0, 0).unwrap().is_empty());
}

/// Readers racing a writer only ever see complete lists, and converge on
/// the final state.
#[test]
fn test_concurrent_readers_converge() {
    let table = source();
    let calls = Arc::new(AtomicUsize::new(0));
    let view = Arc::new(even_view(&table, &calls).build().unwrap());

    thread::scope(|scope| {
        for _ in 0..4 {
            let view = Arc::clone(&view);
            scope.spawn(move || {
                for _ in 0..50 {
                    let entities = view.variable_entities().unwrap();
                    let ids = identifiers(&entities);
                    assert!(ids.iter().all(|id| id.parse::<u32>().unwrap() % 2 == 0));
                }
            });
        }
        scope.spawn(|| {
            for n in 10..30 {
                table
                    .insert(&n.to_string(), [("v", Value::integer(n))])
                    .unwrap();
            }
        });
    });

    let expected = 2 + (10..30).filter(|n| n % 2 == 0).count();
    assert_eq!(view.variable_entities().unwrap().len(), expected);
}

/// Writing a row to the destination of an incremental view removes it
/// from the next listing, whichever tier served the previous one.
#[test]
fn test_incremental_listing_follows_destination_writes() {
    let source = stamped_table("Source", &[("1", 10), ("2", 10)]);
    let destination = stamped_table("Out", &[("3", 5)]);
    let registry = registry(vec![("sync", vec![destination.clone() as TableRef])]);
    let cache: Arc<TaggedCache<Vec<Entity>>> = Arc::new(TaggedCache::default());
    let view = View::builder("Delta")
        .datasource("views")
        .from(source)
        .incremental(registry, "sync.Out")
        .entity_cache(cache)
        .build()
        .unwrap();

    assert_eq!(identifiers(&view.variable_entities().unwrap()), ["1", "2"]);
    assert_eq!(identifiers(&view.variable_entities().unwrap()), ["1", "2"]);

    destination
        .insert_at(
            "1",
            Vec::<(&str, Value)>::new(),
            Timestamps::at(Timestamp::from_micros(20)),
        )
        .unwrap();
    assert_eq!(identifiers(&view.variable_entities().unwrap()), ["2"]);
    assert_eq!(view.variable_entity_count().unwrap(), 1);
    assert!(!view.has_value_set(&participant("1")).unwrap());
}

/// A destination registered after the view was built is used from then on.
#[test]
fn test_incremental_destination_registered_later() {
    let source = stamped_table("Source", &[("1", 10), ("2", 10)]);
    let registry = registry(Vec::new());
    let view = View::builder("Delta")
        .from(source)
        .incremental(Arc::clone(&registry), "sync.Out")
        .build()
        .unwrap();
    assert_eq!(view.variable_entity_count().unwrap(), 2);

    let sync = Arc::new(MemoryDatasource::new("sync"));
    sync.add_table(stamped_table("Out", &[("2", 30)])).unwrap();
    registry.register(sync).unwrap();

    assert_eq!(identifiers(&view.variable_entities().unwrap()), ["1"]);
    assert!(!view.has_value_set(&participant("2")).unwrap());
}

