//! Freshness-tagged cache.
//!
//! Each value is stored with the freshness tag its producer observed (for
//! table entity lists: the table's last update). A reader presents its own
//! current tag; a stored entry whose tag differs is stale and is dropped
//! instead of being served.
//!
//! Keys are fully-qualified table references, so all entries of one
//! datasource can be invalidated at once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tessera_common::types::Timestamp;
use tessera_common::{DEFAULT_ENTITY_CACHE_CAPACITY, REFERENCE_SEPARATOR};

use crate::lru::LruCache;
use crate::stats::CacheStats;

/// A cached value with its freshness tag.
#[derive(Debug)]
pub struct TaggedEntry<V> {
    /// The cached value.
    pub value: Arc<V>,
    /// The freshness tag observed when the value was produced.
    pub tag: Option<Timestamp>,
    /// When this entry was stored.
    pub stored_at: Instant,
}

impl<V> TaggedEntry<V> {
    /// Creates a new entry.
    pub fn new(value: Arc<V>, tag: Option<Timestamp>) -> Self {
        Self {
            value,
            tag,
            stored_at: Instant::now(),
        }
    }

    /// Returns the age of this entry.
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    /// Returns true if this entry can be served to a reader whose current
    /// tag is `current`. An unknown tag is never fresh.
    pub fn is_fresh(&self, current: Option<Timestamp>) -> bool {
        self.tag.is_some() && self.tag == current
    }
}

impl<V> Clone for TaggedEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            tag: self.tag,
            stored_at: self.stored_at,
        }
    }
}

/// A bounded cache of tagged values keyed by table reference.
///
/// # Example
///
/// ```
/// use tessera_cache::tagged::TaggedCache;
/// use tessera_common::types::Timestamp;
///
/// let cache: TaggedCache<Vec<u32>> = TaggedCache::new(16);
/// let t1 = Some(Timestamp::from_micros(1));
/// let t2 = Some(Timestamp::from_micros(2));
///
/// cache.put("ds.Participants", vec![1, 2, 3], t1);
/// assert!(cache.get_fresh("ds.Participants", t1).is_some());
///
/// // The table moved on: the entry is stale and dropped
/// assert!(cache.get_fresh("ds.Participants", t2).is_none());
/// assert!(cache.is_empty());
/// ```
pub struct TaggedCache<V> {
    entries: RwLock<LruCache<String, TaggedEntry<V>>>,
    expirations: CacheStats,
}

impl<V> TaggedCache<V> {
    /// Creates a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            expirations: CacheStats::new(),
        }
    }

    /// Returns the stored entry, fresh or not.
    pub fn get(&self, key: &str) -> Option<TaggedEntry<V>> {
        self.entries.write().get(key).cloned()
    }

    /// Returns the value if its tag matches `current`; drops it otherwise.
    pub fn get_fresh(&self, key: &str, current: Option<Timestamp>) -> Option<Arc<V>> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(current) => return Some(Arc::clone(&entry.value)),
            Some(_) => {}
            None => return None,
        }
        entries.remove(key);
        self.expirations.record_expirations(1);
        None
    }

    /// Stores a value with its freshness tag, replacing any previous one.
    pub fn put(&self, key: impl Into<String>, value: V, tag: Option<Timestamp>) {
        self.put_shared(key, Arc::new(value), tag);
    }

    /// Stores an already shared value.
    pub fn put_shared(&self, key: impl Into<String>, value: Arc<V>, tag: Option<Timestamp>) {
        self.entries
            .write()
            .insert(key.into(), TaggedEntry::new(value, tag));
    }

    /// Drops the entry for one reference.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drops every entry whose reference belongs to `datasource`.
    ///
    /// Returns the number of entries dropped.
    pub fn invalidate_datasource(&self, datasource: &str) -> usize {
        let prefix = format!("{}{}", datasource, REFERENCE_SEPARATOR);
        let removed = self
            .entries
            .write()
            .retain(|key, _| !key.starts_with(&prefix));
        self.expirations.record_expirations(removed as u64);
        removed
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns cache statistics, including stale entries dropped.
    pub fn stats(&self) -> CacheStats {
        let stats = self.entries.read().stats().clone();
        stats.record_expirations(self.expirations.expirations());
        stats
    }
}

impl<V> Default for TaggedCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_ENTITY_CACHE_CAPACITY)
    }
}

impl<V> std::fmt::Debug for TaggedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(micros: u64) -> Option<Timestamp> {
        Some(Timestamp::from_micros(micros))
    }

    #[test]
    fn test_fresh_entry_is_served() {
        let cache: TaggedCache<Vec<i32>> = TaggedCache::new(4);
        cache.put("ds.T", vec![1, 2, 3], tag(7));

        let value = cache.get_fresh("ds.T", tag(7)).unwrap();
        assert_eq!(*value, vec![1, 2, 3]);
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_stale_entry_is_dropped() {
        let cache: TaggedCache<Vec<i32>> = TaggedCache::new(4);
        cache.put("ds.T", vec![1], tag(7));

        assert!(cache.get_fresh("ds.T", tag(8)).is_none());
        assert!(cache.get("ds.T").is_none());
        assert_eq!(cache.stats().expirations(), 1);
    }

    #[test]
    fn test_unknown_tag_is_never_fresh() {
        let cache: TaggedCache<Vec<i32>> = TaggedCache::new(4);
        cache.put("ds.T", vec![1], None);
        assert!(cache.get_fresh("ds.T", None).is_none());
    }

    #[test]
    fn test_invalidate_datasource() {
        let cache: TaggedCache<String> = TaggedCache::new(8);
        cache.put("a.T1", "x".to_string(), tag(1));
        cache.put("a.T2", "y".to_string(), tag(1));
        cache.put("ab.T1", "z".to_string(), tag(1));

        assert_eq!(cache.invalidate_datasource("a"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("ab.T1").is_some());
    }

    #[test]
    fn test_put_replaces() {
        let cache: TaggedCache<String> = TaggedCache::new(8);
        cache.put("a.T", "old".to_string(), tag(1));
        cache.put("a.T", "new".to_string(), tag(2));

        let entry = cache.get("a.T").unwrap();
        assert_eq!(*entry.value, "new");
        assert_eq!(entry.tag, tag(2));
        assert!(cache.invalidate("a.T"));
        assert!(!cache.invalidate("a.T"));
    }
}
