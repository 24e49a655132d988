//! Type definitions for Tessera.
//!
//! This module contains the core value-level types shared by every table:
//! entity identities, typed values and timestamps.

mod entity;
mod timestamps;
mod value;

pub use entity::Entity;
pub use timestamps::{Timestamp, Timestamps};
pub use value::{Value, ValueType};
