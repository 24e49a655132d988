//! Tiered entity list provider.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tessera_common::error::TesseraResult;
use tessera_common::types::{Entity, Timestamp};
use tracing::debug;

use super::{page, CachedEntities, EntityCache, EntityStore};

/// Serves the entity list of one derived table from the first configured
/// tier, computing it when the tier holds nothing usable.
///
/// The store tier is filled the first time a table is listed and is not
/// revalidated afterwards; [`EntityListProvider::invalidate`] empties it.
/// The cache and local tiers compare the stored freshness with the table's
/// current last update and recompute on mismatch. A table whose last update
/// is unknown is recomputed on every call.
#[derive(Debug)]
pub struct EntityListProvider {
    store: Option<Arc<dyn EntityStore>>,
    cache: Option<Arc<dyn EntityCache>>,
    local_enabled: bool,
    local: RwLock<Option<CachedEntities>>,
    /// Serializes local recomputation.
    recompute: Mutex<()>,
}

impl EntityListProvider {
    /// Creates a provider over the given tiers.
    pub fn new(
        store: Option<Arc<dyn EntityStore>>,
        cache: Option<Arc<dyn EntityCache>>,
        local_enabled: bool,
    ) -> Self {
        Self {
            store,
            cache,
            local_enabled,
            local: RwLock::new(None),
            recompute: Mutex::new(()),
        }
    }

    /// Creates a provider that recomputes on every call.
    pub fn uncached() -> Self {
        Self::new(None, None, false)
    }

    /// Creates a provider with only the local tier.
    pub fn local() -> Self {
        Self::new(None, None, true)
    }

    /// Returns true if an entity store is configured.
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Returns true if an entity cache is configured.
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Returns the entity list of `reference`, whose current last update is
    /// `freshness`, computing it with `compute` if no tier can serve it.
    pub fn entities<F>(
        &self,
        reference: &str,
        freshness: Option<Timestamp>,
        compute: F,
    ) -> TesseraResult<Arc<Vec<Entity>>>
    where
        F: FnOnce() -> TesseraResult<Vec<Entity>>,
    {
        if let Some(store) = &self.store {
            if store.exists(reference)? {
                debug!(table = %reference, "Entity list served from store");
                return Ok(Arc::new(store.list(reference)?));
            }
            let list = compute()?;
            debug!(table = %reference, count = list.len(), "Entity list computed for store");
            store.save(reference, &list)?;
            return Ok(Arc::new(list));
        }

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(reference)? {
                if cached.is_current(freshness) {
                    debug!(table = %reference, "Entity list served from cache");
                    return Ok(cached.entities);
                }
            }
            let list = Arc::new(compute()?);
            debug!(table = %reference, count = list.len(), "Entity list recomputed for cache");
            if freshness.is_some() {
                cache.put(reference, CachedEntities::new(Arc::clone(&list), freshness))?;
            }
            return Ok(list);
        }

        if self.local_enabled && freshness.is_some() {
            if let Some(list) = self.local_current(freshness) {
                return Ok(list);
            }
            let _guard = self.recompute.lock();
            // Another caller may have recomputed while this one waited
            if let Some(list) = self.local_current(freshness) {
                return Ok(list);
            }
            let list = Arc::new(compute()?);
            debug!(table = %reference, count = list.len(), "Entity list recomputed");
            *self.local.write() = Some(CachedEntities::new(Arc::clone(&list), freshness));
            return Ok(list);
        }

        Ok(Arc::new(compute()?))
    }

    /// Returns `[offset, offset + limit)` of the entity list; a negative
    /// limit means "to the end".
    pub fn page<F>(
        &self,
        reference: &str,
        freshness: Option<Timestamp>,
        offset: usize,
        limit: i64,
        compute: F,
    ) -> TesseraResult<Vec<Entity>>
    where
        F: FnOnce() -> TesseraResult<Vec<Entity>>,
    {
        if let Some(store) = &self.store {
            if store.exists(reference)? {
                return store.list_paged(reference, offset, limit);
            }
        }
        let list = self.entities(reference, freshness, compute)?;
        Ok(page(&list, offset, limit).to_vec())
    }

    /// Returns the size of the entity list.
    pub fn count<F>(
        &self,
        reference: &str,
        freshness: Option<Timestamp>,
        compute: F,
    ) -> TesseraResult<usize>
    where
        F: FnOnce() -> TesseraResult<Vec<Entity>>,
    {
        if let Some(store) = &self.store {
            if store.exists(reference)? {
                return store.count(reference);
            }
        }
        Ok(self.entities(reference, freshness, compute)?.len())
    }

    /// Drops the list held by every tier, so that the next call recomputes.
    pub fn invalidate(&self, reference: &str) -> TesseraResult<()> {
        *self.local.write() = None;
        if let Some(store) = &self.store {
            store.delete(reference)?;
        }
        if let Some(cache) = &self.cache {
            cache.put(reference, CachedEntities::new(Arc::new(Vec::new()), None))?;
        }
        Ok(())
    }

    fn local_current(&self, freshness: Option<Timestamp>) -> Option<Arc<Vec<Entity>>> {
        self.local
            .read()
            .as_ref()
            .filter(|cached| cached.is_current(freshness))
            .map(|cached| Arc::clone(&cached.entities))
    }
}

impl Default for EntityListProvider {
    fn default() -> Self {
        Self::local()
    }
}
