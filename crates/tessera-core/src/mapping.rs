//! Paired mapping functions.
//!
//! A [`MappingFunction`] translates identities (entities, variable names)
//! between an outer space, the one a derived table exposes, and the inner
//! space of the table it wraps. Both directions are supplied together and
//! cannot be replaced independently.
//!
//! `Ok(None)` from either direction means "no correspondence": the
//! identity does not exist on the other side. It is not an error; errors
//! are reserved for collaborators that failed while deciding.

use std::fmt;
use std::sync::Arc;

use tessera_common::error::TesseraResult;

type MapFn<T> = Arc<dyn Fn(&T) -> TesseraResult<Option<T>> + Send + Sync>;

/// A coupled forward/inverse translation.
///
/// # Example
///
/// ```rust
/// use tessera_core::mapping::MappingFunction;
///
/// let prefixed: MappingFunction<String> = MappingFunction::infallible(
///     |inner: &String| Some(format!("T1_{}", inner)),
///     |outer: &String| outer.strip_prefix("T1_").map(str::to_string),
/// );
///
/// assert_eq!(prefixed.apply(&"AGE".to_string()).unwrap(), Some("T1_AGE".to_string()));
/// assert_eq!(prefixed.unapply(&"AGE".to_string()).unwrap(), None);
/// ```
pub struct MappingFunction<T> {
    // Both `None` for identity
    apply: Option<MapFn<T>>,
    unapply: Option<MapFn<T>>,
}

impl<T: Clone> MappingFunction<T> {
    /// The identity mapping.
    pub fn identity() -> Self {
        Self {
            apply: None,
            unapply: None,
        }
    }

    /// Creates a mapping from a fallible function pair.
    pub fn new<A, U>(apply: A, unapply: U) -> Self
    where
        A: Fn(&T) -> TesseraResult<Option<T>> + Send + Sync + 'static,
        U: Fn(&T) -> TesseraResult<Option<T>> + Send + Sync + 'static,
    {
        Self {
            apply: Some(Arc::new(apply)),
            unapply: Some(Arc::new(unapply)),
        }
    }

    /// Creates a mapping from a function pair that cannot fail.
    pub fn infallible<A, U>(apply: A, unapply: U) -> Self
    where
        A: Fn(&T) -> Option<T> + Send + Sync + 'static,
        U: Fn(&T) -> Option<T> + Send + Sync + 'static,
    {
        Self::new(move |t| Ok(apply(t)), move |t| Ok(unapply(t)))
    }

    /// Maps an inner identity to the outer space.
    pub fn apply(&self, inner: &T) -> TesseraResult<Option<T>> {
        match &self.apply {
            Some(f) => f(inner),
            None => Ok(Some(inner.clone())),
        }
    }

    /// Maps an outer identity back to the inner space.
    pub fn unapply(&self, outer: &T) -> TesseraResult<Option<T>> {
        match &self.unapply {
            Some(f) => f(outer),
            None => Ok(Some(outer.clone())),
        }
    }

    /// Returns true for the identity mapping.
    pub fn is_identity(&self) -> bool {
        self.apply.is_none() && self.unapply.is_none()
    }
}

impl<T: Clone> Default for MappingFunction<T> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<T> Clone for MappingFunction<T> {
    fn clone(&self) -> Self {
        Self {
            apply: self.apply.clone(),
            unapply: self.unapply.clone(),
        }
    }
}

impl<T> fmt::Debug for MappingFunction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.apply.is_none() && self.unapply.is_none() {
            f.write_str("MappingFunction(identity)")
        } else {
            f.write_str("MappingFunction(custom)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_common::error::TesseraError;
    use tessera_common::types::Entity;

    #[test]
    fn test_identity() {
        let mapping: MappingFunction<Entity> = MappingFunction::identity();
        let e = Entity::new("Participant", "1");

        assert!(mapping.is_identity());
        assert_eq!(mapping.apply(&e).unwrap(), Some(e.clone()));
        assert_eq!(mapping.unapply(&e).unwrap(), Some(e));
    }

    #[test]
    fn test_identifier_recoding() {
        let mapping = MappingFunction::infallible(
            |inner: &Entity| Some(inner.with_identifier(format!("X{}", inner.identifier()))),
            |outer: &Entity| {
                outer
                    .identifier()
                    .strip_prefix('X')
                    .map(|id| outer.with_identifier(id))
            },
        );
        let inner = Entity::new("Participant", "7");
        let outer = mapping.apply(&inner).unwrap().unwrap();

        assert!(!mapping.is_identity());
        assert_eq!(outer.identifier(), "X7");
        assert_eq!(mapping.unapply(&outer).unwrap(), Some(inner));
        assert_eq!(mapping.unapply(&Entity::new("Participant", "7")).unwrap(), None);
    }

    #[test]
    fn test_failure_is_not_unmappable() {
        let mapping: MappingFunction<String> = MappingFunction::new(
            |_: &String| Err(TesseraError::internal("lookup failed")),
            |s: &String| Ok(Some(s.clone())),
        );

        assert!(mapping.apply(&"a".to_string()).is_err());
        assert_eq!(mapping.unapply(&"a".to_string()).unwrap(), Some("a".to_string()));
    }

    #[test]
    fn test_clone_shares_functions() {
        let mapping = MappingFunction::infallible(
            |s: &String| Some(s.to_uppercase()),
            |s: &String| Some(s.to_lowercase()),
        );
        let copy = mapping.clone();
        assert_eq!(copy.apply(&"ab".to_string()).unwrap(), Some("AB".to_string()));
    }
}
