//! Entity caches.

use std::fmt;
use std::sync::Arc;

use tessera_cache::tagged::TaggedCache;
use tessera_common::error::TesseraResult;
use tessera_common::types::{Entity, Timestamp};

/// An entity list with the freshness tag observed when it was computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntities {
    /// The entities, in table order.
    pub entities: Arc<Vec<Entity>>,
    /// Last update of the table the list was computed from.
    pub freshness: Option<Timestamp>,
}

impl CachedEntities {
    /// Creates a cached list.
    pub fn new(entities: Arc<Vec<Entity>>, freshness: Option<Timestamp>) -> Self {
        Self {
            entities,
            freshness,
        }
    }

    /// Returns true if the list was computed at `current` and can be
    /// served. An unknown freshness is never current.
    pub fn is_current(&self, current: Option<Timestamp>) -> bool {
        self.freshness.is_some() && self.freshness == current
    }
}

/// External cache of entity lists keyed by table reference.
///
/// The cache only stores; callers compare the freshness tag.
pub trait EntityCache: Send + Sync + fmt::Debug {
    /// Returns the stored list of a table, fresh or not.
    fn get(&self, reference: &str) -> TesseraResult<Option<CachedEntities>>;

    /// Stores a table's list.
    fn put(&self, reference: &str, entities: CachedEntities) -> TesseraResult<()>;
}

impl EntityCache for TaggedCache<Vec<Entity>> {
    fn get(&self, reference: &str) -> TesseraResult<Option<CachedEntities>> {
        Ok(TaggedCache::get(self, reference)
            .map(|entry| CachedEntities::new(entry.value, entry.tag)))
    }

    fn put(&self, reference: &str, entities: CachedEntities) -> TesseraResult<()> {
        self.put_shared(reference, entities.entities, entities.freshness);
        Ok(())
    }
}
