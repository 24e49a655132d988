//! Tessera Performance Benchmarks
//!
//! This crate contains benchmarks for the derived table layer:
//! - Batched versus single row fetches through views and joins
//! - Cached versus uncached entity lists of filtered views
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p tessera-bench
//! ```

pub mod utils;
