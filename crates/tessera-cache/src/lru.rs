//! LRU (Least Recently Used) Cache implementation.
//!
//! Every access stamps the entry with a monotonically increasing tick; an
//! ordered map from tick to key gives the least recently used entry in
//! O(log n) without any unsafe linked-list bookkeeping.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::stats::CacheStats;

struct Slot<V> {
    value: V,
    tick: u64,
}

/// A bounded LRU cache.
///
/// # Example
///
/// ```
/// use tessera_cache::lru::LruCache;
///
/// let mut cache = LruCache::new(2);
/// cache.insert("a", 1);
/// cache.insert("b", 2);
/// assert_eq!(cache.get(&"a"), Some(&1));
///
/// // Adding a third item evicts "b" (least recently used)
/// cache.insert("c", 3);
/// assert_eq!(cache.get(&"b"), None);
/// ```
pub struct LruCache<K, V> {
    /// Maximum capacity.
    capacity: usize,
    /// Entries by key.
    map: HashMap<K, Slot<V>>,
    /// Keys by last access tick, oldest first.
    order: BTreeMap<u64, K>,
    /// Last tick handed out.
    tick: u64,
    /// Statistics.
    stats: CacheStats,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Creates a new LRU cache with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            map: HashMap::with_capacity(capacity.min(1024)),
            order: BTreeMap::new(),
            tick: 0,
            stats: CacheStats::new(),
        }
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the maximum capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Gets a reference to the value for the given key.
    ///
    /// This marks the entry as recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let tick = self.next_tick();
        match self.map.get_mut(key) {
            Some(slot) => {
                let previous = std::mem::replace(&mut slot.tick, tick);
                if let Some(k) = self.order.remove(&previous) {
                    self.order.insert(tick, k);
                }
                self.stats.record_lookup(true);
                Some(&slot.value)
            }
            None => {
                self.stats.record_lookup(false);
                None
            }
        }
    }

    /// Gets a reference to the value without updating recency or stats.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).map(|slot| &slot.value)
    }

    /// Checks if the cache contains the given key without updating recency.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Inserts a key-value pair into the cache.
    ///
    /// If the key already exists, updates the value and returns the old value.
    /// If the cache is at capacity, evicts the least recently used entry.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.stats.record_insert();
        let tick = self.next_tick();

        if let Some(slot) = self.map.get_mut(&key) {
            let previous = std::mem::replace(&mut slot.tick, tick);
            self.order.remove(&previous);
            self.order.insert(tick, key);
            return Some(std::mem::replace(&mut slot.value, value));
        }

        if self.map.len() >= self.capacity {
            self.evict_lru();
        }

        self.order.insert(tick, key.clone());
        self.map.insert(key, Slot { value, tick });
        None
    }

    /// Removes an entry from the cache.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.map.remove(key)?;
        self.order.remove(&slot.tick);
        Some(slot.value)
    }

    /// Removes every entry for which `keep` returns false.
    ///
    /// Returns the number of entries removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let before = self.map.len();
        let order = &mut self.order;
        self.map.retain(|k, slot| {
            let kept = keep(k, &slot.value);
            if !kept {
                order.remove(&slot.tick);
            }
            kept
        });
        before - self.map.len()
    }

    /// Clears all entries from the cache.
    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self) {
        if let Some((_, key)) = self.order.pop_first() {
            self.map.remove(&key);
            self.stats.record_eviction();
        }
    }
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut cache = LruCache::new(3);

        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_eviction() {
        let mut cache = LruCache::new(2);

        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3); // This should evict "a"

        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn test_access_updates_recency() {
        let mut cache = LruCache::new(2);

        cache.insert("a", 1);
        cache.insert("b", 2);

        // Access "a" to make it more recent than "b"
        cache.get(&"a");

        // Insert "c", should evict "b" (least recently used)
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn test_update_existing() {
        let mut cache = LruCache::new(2);

        cache.insert("a", 1);
        let old = cache.insert("a", 10);

        assert_eq!(old, Some(1));
        assert_eq!(cache.get(&"a"), Some(&10));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_and_retain() {
        let mut cache = LruCache::new(4);

        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert_eq!(cache.remove(&"a"), Some(1));
        assert_eq!(cache.retain(|_, v| *v != 2), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek(&"c"), Some(&3));

        // Ordering stays consistent after retain
        cache.insert("d", 4);
        cache.insert("e", 5);
        cache.insert("f", 6);
        cache.insert("g", 7);
        assert!(!cache.contains(&"c"));
    }

    #[test]
    fn test_statistics() {
        let mut cache = LruCache::new(2);

        cache.insert("a", 1);
        cache.get(&"a"); // hit
        cache.get(&"b"); // miss
        cache.insert("b", 2);
        cache.insert("c", 3); // eviction

        let stats = cache.stats();
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.evictions(), 1);
    }
}
