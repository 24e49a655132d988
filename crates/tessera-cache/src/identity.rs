//! Identity-keyed cache with weak retention.
//!
//! Values are keyed by the identity of a shared allocation (`Arc<T>`), not
//! by its content. The cache holds only a [`Weak`] reference to each key,
//! so an entry becomes unreachable as soon as the last strong reference to
//! its owner is dropped; dead entries are purged lazily on insertion.
//!
//! A freed allocation may be reused for a new owner at the same address.
//! Lookups therefore upgrade the stored weak reference and compare
//! pointers, so a new owner never observes the decision made for a dead
//! one.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::stats::CacheStats;

struct Entry<T: ?Sized, V> {
    owner: Weak<T>,
    value: V,
}

/// A cache whose keys are shared allocations, retained weakly.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tessera_cache::identity::IdentityCache;
///
/// let cache: IdentityCache<str, bool> = IdentityCache::new(16);
/// let row: Arc<str> = Arc::from("row-1");
/// cache.insert(&row, true);
/// assert_eq!(cache.get(&row), Some(true));
///
/// // Same content, different identity
/// let other: Arc<str> = Arc::from("row-1");
/// assert_eq!(cache.get(&other), None);
/// ```
pub struct IdentityCache<T: ?Sized, V> {
    capacity: usize,
    entries: Mutex<HashMap<usize, Entry<T, V>>>,
    stats: CacheStats,
}

impl<T: ?Sized, V: Clone> IdentityCache<T, V> {
    /// Creates a cache retaining at most `capacity` live entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
            stats: CacheStats::new(),
        }
    }

    /// Returns the value cached for this owner, if it is still alive.
    pub fn get(&self, owner: &Arc<T>) -> Option<V> {
        let entries = self.entries.lock();
        let value = entries
            .get(&identity(owner))
            .filter(|entry| is_same_owner(&entry.owner, owner))
            .map(|entry| entry.value.clone());
        self.stats.record_lookup(value.is_some());
        value
    }

    /// Caches a value for this owner.
    pub fn insert(&self, owner: &Arc<T>, value: V) {
        let mut entries = self.entries.lock();
        let key = identity(owner);

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let purged = purge_dead(&mut entries);
            self.stats.record_expirations(purged as u64);
            if entries.len() >= self.capacity {
                if let Some(victim) = entries.keys().next().copied() {
                    entries.remove(&victim);
                    self.stats.record_eviction();
                }
            }
        }

        self.stats.record_insert();
        entries.insert(
            key,
            Entry {
                owner: Arc::downgrade(owner),
                value,
            },
        );
    }

    /// Returns the cached value or computes, caches and returns it.
    ///
    /// The computation runs without holding the cache lock; concurrent
    /// callers may compute the same value more than once.
    pub fn get_or_try_insert_with<E, F>(&self, owner: &Arc<T>, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(owner) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(owner, value.clone());
        Ok(value)
    }

    /// Drops every entry whose owner is gone. Returns the number dropped.
    pub fn purge(&self) -> usize {
        let purged = purge_dead(&mut self.entries.lock());
        self.stats.record_expirations(purged as u64);
        purged
    }

    /// Returns the number of entries, dead or alive.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the cache holds no entry.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<T: ?Sized, V> std::fmt::Debug for IdentityCache<T, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn identity<T: ?Sized>(owner: &Arc<T>) -> usize {
    Arc::as_ptr(owner).cast::<()>() as usize
}

fn is_same_owner<T: ?Sized>(stored: &Weak<T>, owner: &Arc<T>) -> bool {
    stored
        .upgrade()
        .map_or(false, |alive| Arc::ptr_eq(&alive, owner))
}

fn purge_dead<T: ?Sized, V>(entries: &mut HashMap<usize, Entry<T, V>>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.owner.strong_count() > 0);
    before - entries.len()
}
