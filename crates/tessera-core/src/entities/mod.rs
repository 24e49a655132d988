//! Entity lists of derived tables.
//!
//! Enumerating the rows of a view or a join may evaluate a Where clause on
//! every row or union many tables. [`EntityListProvider`] keeps the result
//! in the first available tier:
//!
//! 1. an external [`EntityStore`], filled once per table
//! 2. an external [`EntityCache`], validated against the table's last update
//! 3. an in-process list local to the provider, validated the same way
//!
//! Paging is served from whichever tier holds the list.

mod cache;
mod provider;
mod store;

pub use cache::{CachedEntities, EntityCache};
pub use provider::EntityListProvider;
pub use store::{EntityStore, MemoryEntityStore};

use tessera_common::types::Entity;

/// Returns `[offset, offset + limit)` of a list.
///
/// The offset is clamped to the list; a negative limit means "to the end".
///
/// # Example
///
/// ```rust
/// use tessera_common::types::Entity;
/// use tessera_core::entities::page;
///
/// let list: Vec<_> = (0..5).map(|i| Entity::new("P", i.to_string())).collect();
/// assert_eq!(page(&list, 3, -1).len(), 2);
/// assert_eq!(page(&list, 1, 2)[0].identifier(), "1");
/// assert!(page(&list, 9, 2).is_empty());
/// ```
pub fn page(entities: &[Entity], offset: usize, limit: i64) -> &[Entity] {
    let start = offset.min(entities.len());
    let end = match usize::try_from(limit) {
        Ok(limit) => start.saturating_add(limit).min(entities.len()),
        Err(_) => entities.len(),
    };
    &entities[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_common::UNBOUNDED_LIMIT;

    fn list(n: usize) -> Vec<Entity> {
        (0..n).map(|i| Entity::new("P", i.to_string())).collect()
    }

    #[test]
    fn test_page_bounds() {
        let l = list(4);
        assert_eq!(page(&l, 0, UNBOUNDED_LIMIT).len(), 4);
        assert_eq!(page(&l, 0, 0).len(), 0);
        assert_eq!(page(&l, 2, 10).len(), 2);
        assert_eq!(page(&l, 4, 1).len(), 0);
        assert_eq!(page(&l, usize::MAX, i64::MAX).len(), 0);
        assert_eq!(page(&l, 1, -7).len(), 3);
    }
}
