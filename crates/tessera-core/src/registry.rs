//! Datasource registry.
//!
//! The registry is the one place where a `datasource.table` reference is
//! resolved into a live table. It is an explicit object handed to the
//! components that need resolution (incremental views); datasources are
//! registered and torn down explicitly, and a reference that does not
//! resolve is reported as an error rather than created on the fly.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use tessera_common::error::{TesseraError, TesseraResult};
use tessera_common::REFERENCE_SEPARATOR;
use tracing::debug;

use crate::table::{TableRef, ValueTable};

/// A fully-qualified table reference.
///
/// # Example
///
/// ```rust
/// use tessera_core::registry::TableReference;
///
/// let reference: TableReference = "cohort.Participants".parse().unwrap();
/// assert_eq!(reference.datasource(), "cohort");
/// assert_eq!(reference.table(), "Participants");
/// assert!("Participants".parse::<TableReference>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableReference {
    datasource: String,
    table: String,
}

impl TableReference {
    /// Creates a reference from its parts.
    pub fn new(datasource: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            datasource: datasource.into(),
            table: table.into(),
        }
    }

    /// Returns the datasource name.
    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl FromStr for TableReference {
    type Err = TesseraError;

    /// Splits at the first separator; table names may contain further ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(REFERENCE_SEPARATOR) {
            Some((ds, table)) if !ds.is_empty() && !table.is_empty() => Ok(Self::new(ds, table)),
            _ => Err(TesseraError::InvalidReference {
                reference: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.datasource, REFERENCE_SEPARATOR, self.table)
    }
}

/// A named group of tables.
pub trait Datasource: Send + Sync + fmt::Debug {
    /// Returns the datasource name.
    fn name(&self) -> &str;

    /// Returns the table names.
    fn table_names(&self) -> Vec<String>;

    /// Returns a table by name, or `TableNotFound`.
    fn table(&self, name: &str) -> TesseraResult<TableRef>;

    /// Returns true if the datasource holds a table of this name.
    fn has_table(&self, name: &str) -> bool {
        self.table(name).is_ok()
    }
}

/// A datasource whose tables are added at runtime.
#[derive(Debug)]
pub struct MemoryDatasource {
    name: String,
    tables: RwLock<HashMap<String, TableRef>>,
}

impl MemoryDatasource {
    /// Creates an empty datasource.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a table under its own name.
    pub fn add_table(&self, table: TableRef) -> TesseraResult<()> {
        let mut tables = self.tables.write();
        let name = table.name().to_string();
        if tables.contains_key(&name) {
            return Err(TesseraError::invalid_argument(format!(
                "table '{}' already exists in datasource '{}'",
                name, self.name
            )));
        }
        tables.insert(name, table);
        Ok(())
    }

    /// Removes a table.
    pub fn remove_table(&self, name: &str) -> TesseraResult<TableRef> {
        self.tables
            .write()
            .remove(name)
            .ok_or_else(|| TesseraError::TableNotFound {
                datasource: self.name.clone(),
                table: name.to_string(),
            })
    }

    /// Returns the number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.read().len()
    }
}

impl Datasource for MemoryDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn table(&self, name: &str) -> TesseraResult<TableRef> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| TesseraError::TableNotFound {
                datasource: self.name.clone(),
                table: name.to_string(),
            })
    }

    fn has_table(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }
}

/// Resolves table references across registered datasources.
#[derive(Debug, Default)]
pub struct Registry {
    datasources: RwLock<HashMap<String, Arc<dyn Datasource>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a datasource. Names must be unique.
    pub fn register(&self, datasource: Arc<dyn Datasource>) -> TesseraResult<()> {
        let mut datasources = self.datasources.write();
        let name = datasource.name().to_string();
        if datasources.contains_key(&name) {
            return Err(TesseraError::invalid_argument(format!(
                "datasource '{}' already registered",
                name
            )));
        }
        debug!(datasource = %name, "Registered datasource");
        datasources.insert(name, datasource);
        Ok(())
    }

    /// Unregisters a datasource.
    pub fn unregister(&self, name: &str) -> TesseraResult<Arc<dyn Datasource>> {
        let removed = self
            .datasources
            .write()
            .remove(name)
            .ok_or_else(|| TesseraError::DatasourceNotFound {
                datasource: name.to_string(),
            })?;
        debug!(datasource = %name, "Unregistered datasource");
        Ok(removed)
    }

    /// Unregisters every datasource.
    pub fn clear(&self) {
        self.datasources.write().clear();
    }

    /// Returns a datasource by name.
    pub fn datasource(&self, name: &str) -> TesseraResult<Arc<dyn Datasource>> {
        self.datasources
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| TesseraError::DatasourceNotFound {
                datasource: name.to_string(),
            })
    }

    /// Returns the registered datasource names, sorted.
    pub fn datasource_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.datasources.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolves a reference.
    pub fn table(&self, reference: &TableReference) -> TesseraResult<TableRef> {
        // Release the registry lock before calling into the datasource
        let datasource = self.datasource(reference.datasource())?;
        datasource.table(reference.table())
    }

    /// Parses and resolves a `datasource.table` string.
    pub fn resolve(&self, reference: &str) -> TesseraResult<TableRef> {
        self.table(&reference.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTable;

    fn registry_with_table() -> Registry {
        let ds = MemoryDatasource::new("cohort");
        let table = MemoryTable::builder("Participants", "Participant")
            .datasource("cohort")
            .build();
        ds.add_table(Arc::new(table)).unwrap();
        let registry = Registry::new();
        registry.register(Arc::new(ds)).unwrap();
        registry
    }

    #[test]
    fn test_resolve() {
        let registry = registry_with_table();
        let table = registry.resolve("cohort.Participants").unwrap();
        assert_eq!(table.reference(), "cohort.Participants");
    }

    #[test]
    fn test_resolve_errors() {
        let registry = registry_with_table();

        assert!(matches!(
            registry.resolve("other.Participants"),
            Err(TesseraError::DatasourceNotFound { .. })
        ));
        assert!(matches!(
            registry.resolve("cohort.Samples"),
            Err(TesseraError::TableNotFound { .. })
        ));
        assert!(matches!(
            registry.resolve("cohort"),
            Err(TesseraError::InvalidReference { .. })
        ));
        assert!(matches!(
            registry.resolve(".Participants"),
            Err(TesseraError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_lifecycle() {
        let registry = registry_with_table();
        assert!(registry
            .register(Arc::new(MemoryDatasource::new("cohort")))
            .is_err());

        registry.unregister("cohort").unwrap();
        assert!(registry.datasource_names().is_empty());
        assert!(registry.unregister("cohort").is_err());

        registry.register(Arc::new(MemoryDatasource::new("a"))).unwrap();
        registry.register(Arc::new(MemoryDatasource::new("b"))).unwrap();
        assert_eq!(registry.datasource_names(), ["a", "b"]);
        registry.clear();
        assert!(registry.datasource_names().is_empty());
    }

    #[test]
    fn test_reference_display() {
        let reference = TableReference::new("cohort", "Visits.2020");
        assert_eq!(reference.to_string(), "cohort.Visits.2020");
        assert_eq!("cohort.Visits.2020".parse::<TableReference>().unwrap(), reference);
    }

    #[test]
    fn test_duplicate_table() {
        let ds = MemoryDatasource::new("cohort");
        let table: TableRef = Arc::new(MemoryTable::builder("T", "Participant").build());
        ds.add_table(Arc::clone(&table)).unwrap();
        assert!(ds.add_table(table).is_err());
        assert_eq!(ds.table_names(), ["T"]);
        ds.remove_table("T").unwrap();
        assert!(!ds.has_table("T"));
    }
}
