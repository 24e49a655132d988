//! Entity stores.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use tessera_common::error::TesseraResult;
use tessera_common::types::Entity;

use super::page;

/// Persistent storage of the entity list of tables, keyed by table
/// reference.
pub trait EntityStore: Send + Sync + fmt::Debug {
    /// Saves a table's entity list, replacing any previous one.
    fn save(&self, reference: &str, entities: &[Entity]) -> TesseraResult<()>;

    /// Returns a table's whole entity list; empty if none was saved.
    fn list(&self, reference: &str) -> TesseraResult<Vec<Entity>>;

    /// Returns a page of a table's entity list.
    fn list_paged(&self, reference: &str, offset: usize, limit: i64) -> TesseraResult<Vec<Entity>> {
        Ok(page(&self.list(reference)?, offset, limit).to_vec())
    }

    /// Returns the number of entities saved for a table.
    fn count(&self, reference: &str) -> TesseraResult<usize> {
        Ok(self.list(reference)?.len())
    }

    /// Returns true if a list was saved for a table.
    fn exists(&self, reference: &str) -> TesseraResult<bool>;

    /// Deletes a table's entity list.
    fn delete(&self, reference: &str) -> TesseraResult<()>;
}

/// An entity store held in memory.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    lists: RwLock<HashMap<String, Vec<Entity>>>,
}

impl MemoryEntityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityStore for MemoryEntityStore {
    fn save(&self, reference: &str, entities: &[Entity]) -> TesseraResult<()> {
        self.lists
            .write()
            .insert(reference.to_string(), entities.to_vec());
        Ok(())
    }

    fn list(&self, reference: &str) -> TesseraResult<Vec<Entity>> {
        Ok(self.lists.read().get(reference).cloned().unwrap_or_default())
    }

    fn list_paged(&self, reference: &str, offset: usize, limit: i64) -> TesseraResult<Vec<Entity>> {
        Ok(self
            .lists
            .read()
            .get(reference)
            .map(|list| page(list, offset, limit).to_vec())
            .unwrap_or_default())
    }

    fn count(&self, reference: &str) -> TesseraResult<usize> {
        Ok(self.lists.read().get(reference).map_or(0, Vec::len))
    }

    fn exists(&self, reference: &str) -> TesseraResult<bool> {
        Ok(self.lists.read().contains_key(reference))
    }

    fn delete(&self, reference: &str) -> TesseraResult<()> {
        self.lists.write().remove(reference);
        Ok(())
    }
}
