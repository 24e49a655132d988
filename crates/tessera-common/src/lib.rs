//! # tessera-common
//!
//! Common types, errors, and configuration for Tessera.
//!
//! This crate provides the foundational types shared by the cache and the
//! table virtualization core:
//!
//! - **Types**: `Entity` identities, typed `Value`s, `Timestamp`s
//! - **Errors**: the `TesseraError` taxonomy and `ErrorCode`
//! - **Config**: `TesseraConfig`, loadable from TOML
//! - **Constants**: defaults shared by the configuration and the core
//!
//! ## Example
//!
//! ```rust
//! use tessera_common::types::{Entity, Value, ValueType};
//! use tessera_common::error::TesseraResult;
//!
//! fn example() -> TesseraResult<()> {
//!     let entity = Entity::new("Participant", "1234");
//!     let value = Value::text("female");
//!     assert_eq!(value.value_type(), ValueType::Text);
//!     assert_eq!(entity.identifier(), "1234");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::TesseraConfig;
pub use constants::*;
pub use error::{ErrorCode, SchemaConflict, TesseraError, TesseraResult};
pub use types::{Entity, Timestamp, Timestamps, Value, ValueType};
