//! Tessera configuration structures.
//!
//! These structures define the tunable aspects of views and joins: which
//! entity list cache tiers are active, whether Where decisions are cached,
//! and whether join members are checked for a common entity type.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::DEFAULT_WHERE_CACHE_CAPACITY;
use crate::error::{TesseraError, TesseraResult};

/// Main Tessera configuration.
///
/// # Example
///
/// ```rust
/// use tessera_common::config::TesseraConfig;
///
/// let config = TesseraConfig::from_toml_str("[where_cache]\nenabled = true\n").unwrap();
/// assert!(config.where_cache.enabled);
/// assert!(config.entities.local_cache);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesseraConfig {
    /// Entity list caching.
    #[serde(default)]
    pub entities: EntityListConfig,

    /// Caching of Where clause decisions.
    #[serde(default)]
    pub where_cache: WhereCacheConfig,

    /// Join construction.
    #[serde(default)]
    pub join: JoinConfig,
}

impl TesseraConfig {
    /// Parses a configuration from TOML text and validates it.
    pub fn from_toml_str(content: &str) -> TesseraResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| TesseraError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> TesseraResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serializes this configuration as TOML.
    pub fn to_toml_string(&self) -> TesseraResult<String> {
        toml::to_string_pretty(self).map_err(|e| TesseraError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> TesseraResult<()> {
        if self.where_cache.capacity == 0 {
            return Err(TesseraError::InvalidConfig {
                message: "where_cache.capacity must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Entity list cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityListConfig {
    /// Keep the in-process entity list of a view when no entity store
    /// or external cache is configured.
    /// Default: true
    #[serde(default = "default_true")]
    pub local_cache: bool,
}

impl Default for EntityListConfig {
    fn default() -> Self {
        Self { local_cache: true }
    }
}

/// Where clause decision cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhereCacheConfig {
    /// Wrap predicate Where clauses with a row-identity cache.
    /// Default: false
    #[serde(default)]
    pub enabled: bool,

    /// Maximum number of live rows whose decision is retained.
    /// Default: 10000
    #[serde(default = "default_where_cache_capacity")]
    pub capacity: usize,
}

impl Default for WhereCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: DEFAULT_WHERE_CACHE_CAPACITY,
        }
    }
}

/// Join configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Reject member tables whose entity type differs from the first one.
    /// Default: true
    #[serde(default = "default_true")]
    pub validate_entity_type: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            validate_entity_type: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_where_cache_capacity() -> usize {
    DEFAULT_WHERE_CACHE_CAPACITY
}
