//! # tessera-test
//!
//! Integration tests for Tessera.
//!
//! This crate contains:
//! - Shared fixtures: sample tables, registries and instrumented tables
//! - Integration tests under `tests/`, one file per area

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Test fixtures and helpers
pub mod fixtures;
