//! Tessera error types.
//!
//! Provides the error taxonomy for table virtualization: rows and
//! variables that are not visible, join schema conflicts, registry
//! lookups and verbatim collaborator failures.

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

use crate::types::Entity;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Internal error (bug).
    Internal = 0x0000,
    /// Invalid argument provided.
    InvalidArgument = 0x0001,
    /// Invalid configuration.
    InvalidConfig = 0x0002,
    /// I/O error while loading configuration.
    Io = 0x0003,

    // Table errors (0x0100 - 0x01FF)
    /// No visible row for an entity.
    NoSuchRow = 0x0100,
    /// Variable not exposed by a table.
    NoSuchVariable = 0x0101,
    /// Two join members disagree on a variable definition.
    SchemaConflict = 0x0102,
    /// A join member has a different entity type.
    EntityTypeMismatch = 0x0103,

    // Registry errors (0x0200 - 0x02FF)
    /// Datasource not registered.
    DatasourceNotFound = 0x0200,
    /// Table not found in a datasource.
    TableNotFound = 0x0201,
    /// Malformed table reference.
    InvalidReference = 0x0202,

    // Collaborator errors (0x0300 - 0x03FF)
    /// Failure raised by a physical table, entity store or cache.
    Collaborator = 0x0300,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Table",
            0x02 => "Registry",
            0x03 => "Collaborator",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Two member tables of a join define the same variable name with
/// incompatible keys.
///
/// Kept as a cloneable value so that a join can report the exact same
/// failure on every schema access.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaConflict {
    /// The join table name.
    pub table: String,
    /// The conflicting variable name.
    pub variable: String,
    /// Key of the first definition seen.
    pub first: String,
    /// Key of the incompatible definition.
    pub second: String,
}

impl fmt::Display for SchemaConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "variable '{}' in join '{}' is defined as {} and as {}",
            self.variable, self.table, self.first, self.second
        )
    }
}

/// The main error type for Tessera.
///
/// # Example
///
/// ```rust
/// use tessera_common::error::{ErrorCode, TesseraError};
///
/// let err = TesseraError::NoSuchVariable {
///     table: "ds.Participants".into(),
///     variable: "AGE".into(),
/// };
/// assert_eq!(err.code(), ErrorCode::NoSuchVariable);
/// assert!(err.is_not_found());
/// ```
#[derive(Debug, Error)]
pub enum TesseraError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    // ==========================================================================
    // Table Errors
    // ==========================================================================
    /// The entity has no visible row after mapping and filtering.
    #[error("no row for entity {entity} in table '{table}'")]
    NoSuchRow {
        /// The table that was asked.
        table: String,
        /// The entity without a row.
        entity: Entity,
    },

    /// The variable is not exposed by the table.
    #[error("no variable '{variable}' in table '{table}'")]
    NoSuchVariable {
        /// The table that was asked.
        table: String,
        /// The missing variable name.
        variable: String,
    },

    /// Join members define the same variable incompatibly.
    #[error("schema conflict: {0}")]
    SchemaConflict(SchemaConflict),

    /// A table does not have the expected entity type.
    #[error("table '{table}' has entity type '{actual}', expected '{expected}'")]
    EntityTypeMismatch {
        /// Expected entity type.
        expected: String,
        /// Entity type of the offending table.
        actual: String,
        /// The offending table.
        table: String,
    },

    // ==========================================================================
    // Registry Errors
    // ==========================================================================
    /// Datasource is not registered.
    #[error("datasource '{datasource}' not found")]
    DatasourceNotFound {
        /// The missing datasource.
        datasource: String,
    },

    /// Table is not part of its datasource.
    #[error("table '{table}' not found in datasource '{datasource}'")]
    TableNotFound {
        /// The datasource that was searched.
        datasource: String,
        /// The missing table.
        table: String,
    },

    /// Reference string is not of the form `datasource.table`.
    #[error("invalid table reference '{reference}'")]
    InvalidReference {
        /// The malformed reference.
        reference: String,
    },

    // ==========================================================================
    // Collaborator Errors
    // ==========================================================================
    /// A physical table, entity store or cache failed.
    #[error(transparent)]
    Collaborator {
        /// The collaborator's own error, unchanged.
        #[from]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl TesseraError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::Io { .. } => ErrorCode::Io,
            Self::NoSuchRow { .. } => ErrorCode::NoSuchRow,
            Self::NoSuchVariable { .. } => ErrorCode::NoSuchVariable,
            Self::SchemaConflict(_) => ErrorCode::SchemaConflict,
            Self::EntityTypeMismatch { .. } => ErrorCode::EntityTypeMismatch,
            Self::DatasourceNotFound { .. } => ErrorCode::DatasourceNotFound,
            Self::TableNotFound { .. } => ErrorCode::TableNotFound,
            Self::InvalidReference { .. } => ErrorCode::InvalidReference,
            Self::Collaborator { .. } => ErrorCode::Collaborator,
        }
    }

    /// Returns true if this error reports a missing row, variable, table
    /// or datasource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoSuchRow { .. }
                | Self::NoSuchVariable { .. }
                | Self::DatasourceNotFound { .. }
                | Self::TableNotFound { .. }
        )
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a missing-row error.
    #[must_use]
    pub fn no_such_row(table: impl Into<String>, entity: &Entity) -> Self {
        Self::NoSuchRow {
            table: table.into(),
            entity: entity.clone(),
        }
    }

    /// Creates a missing-variable error.
    #[must_use]
    pub fn no_such_variable(table: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::NoSuchVariable {
            table: table.into(),
            variable: variable.into(),
        }
    }

    /// Wraps a collaborator failure without altering it.
    #[must_use]
    pub fn collaborator<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Collaborator {
            source: Box::new(error),
        }
    }
}

impl From<SchemaConflict> for TesseraError {
    fn from(conflict: SchemaConflict) -> Self {
        Self::SchemaConflict(conflict)
    }
}
