//! Caching utilities for Tessera.
//!
//! This crate provides the caches used by the table virtualization core:
//!
//! - **LRU Cache**: bounded least-recently-used map
//! - **Identity Cache**: values keyed by the identity of a shared
//!   allocation, retained only while that allocation is alive
//! - **Tagged Cache**: values stored with a freshness tag, served only
//!   while the tag still matches the caller's current one
//!
//! # Example
//!
//! ```rust
//! use tessera_cache::lru::LruCache;
//!
//! let mut cache = LruCache::new(100);
//! cache.insert("key1", "value1");
//! assert_eq!(cache.get(&"key1"), Some(&"value1"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod identity;
pub mod lru;
pub mod stats;
pub mod tagged;

pub use identity::IdentityCache;
pub use lru::LruCache;
pub use stats::CacheStats;
pub use tagged::{TaggedCache, TaggedEntry};
