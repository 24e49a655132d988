//! System-wide constants for Tessera.
//!
//! Defaults referenced by the configuration and by the table core.

// =============================================================================
// Entity List Constants
// =============================================================================

/// Separator between the datasource and table parts of a table reference.
pub const REFERENCE_SEPARATOR: char = '.';

/// Initial capacity used for entity lists when no previous size is known.
pub const DEFAULT_ENTITY_CAPACITY: usize = 64;

/// Limit value meaning "to the end of the list" when paging entities.
pub const UNBOUNDED_LIMIT: i64 = -1;

// =============================================================================
// Cache Constants
// =============================================================================

/// Default number of row decisions retained by a caching Where clause.
pub const DEFAULT_WHERE_CACHE_CAPACITY: usize = 10_000;

/// Default number of tables whose entity lists a tagged cache retains.
pub const DEFAULT_ENTITY_CACHE_CAPACITY: usize = 256;
