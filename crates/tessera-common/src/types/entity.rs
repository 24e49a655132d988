//! Entity identity.
//!
//! An entity identifies one logical subject (a participant, a sample, ...)
//! across every table that holds data about it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a row subject: an entity type plus an identifier.
///
/// Two entities are equal when both parts are equal, whatever table they
/// were read from.
///
/// # Example
///
/// ```rust
/// use tessera_common::types::Entity;
///
/// let a = Entity::new("Participant", "1");
/// let b = Entity::new("Participant", "1");
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "Participant:1");
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity {
    entity_type: String,
    identifier: String,
}

impl Entity {
    /// Creates a new entity.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            identifier: identifier.into(),
        }
    }

    /// Returns the entity type.
    #[inline]
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the identifier.
    #[inline]
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns an entity of the same type with another identifier.
    #[must_use]
    pub fn with_identifier(&self, identifier: impl Into<String>) -> Self {
        Self::new(self.entity_type.clone(), identifier)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}:{})", self.entity_type, self.identifier)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.identifier)
    }
}
