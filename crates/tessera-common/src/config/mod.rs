//! Configuration for Tessera.
//!
//! This module provides configuration structures for views, joins and the
//! entity list caches.

mod settings;

pub use settings::{EntityListConfig, JoinConfig, TesseraConfig, WhereCacheConfig};
