//! Cache statistics for monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for cache operations.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of lookups that found a usable entry.
    hits: AtomicU64,
    /// Number of lookups that found nothing usable.
    misses: AtomicU64,
    /// Number of insertions.
    inserts: AtomicU64,
    /// Number of entries dropped to respect the capacity.
    evictions: AtomicU64,
    /// Number of entries dropped because they went stale or their key died.
    expirations: AtomicU64,
}

impl CacheStats {
    /// Creates new statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of a lookup.
    #[inline]
    pub fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records an insertion.
    #[inline]
    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a capacity eviction.
    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` entries dropped as stale.
    #[inline]
    pub fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns total lookups.
    pub fn lookups(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Returns cache hits.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns cache misses.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns insertions.
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Returns capacity evictions.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Returns stale entries dropped.
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Returns the hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            0.0
        } else {
            self.hits() as f64 / lookups as f64
        }
    }

    /// Resets all statistics.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits()),
            misses: AtomicU64::new(self.misses()),
            inserts: AtomicU64::new(self.inserts()),
            evictions: AtomicU64::new(self.evictions()),
            expirations: AtomicU64::new(self.expirations()),
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_ratio: {:.2}%, inserts: {}, evictions: {}, expirations: {} }}",
            self.hits(),
            self.misses(),
            self.hit_ratio() * 100.0,
            self.inserts(),
            self.evictions(),
            self.expirations()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_stats() {
        let stats = CacheStats::new();

        stats.record_lookup(true);
        stats.record_lookup(false);

        assert_eq!(stats.lookups(), 2);
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 1);
        assert!((stats.hit_ratio() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_reset() {
        let stats = CacheStats::new();

        stats.record_lookup(true);
        stats.record_expirations(3);
        stats.reset();

        assert_eq!(stats.lookups(), 0);
        assert_eq!(stats.expirations(), 0);
    }

    #[test]
    fn test_clone() {
        let stats = CacheStats::new();
        stats.record_insert();
        stats.record_eviction();

        let cloned = stats.clone();
        assert_eq!(cloned.inserts(), 1);
        assert_eq!(cloned.evictions(), 1);
    }
}
