//! Error handling for Tessera.
//!
//! This module provides the error taxonomy and result alias used across
//! all Tessera components.

mod tessera;

pub use tessera::{ErrorCode, SchemaConflict, TesseraError};

/// Result type alias for Tessera operations.
pub type TesseraResult<T> = std::result::Result<T, TesseraError>;
