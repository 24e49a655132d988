//! # tessera-core
//!
//! Table virtualization for Tessera.
//!
//! Every table, physical or derived, implements [`ValueTable`]. This crate
//! composes tables without copying data:
//!
//! - **Transforming tables**: a wrapped table re-exposed through entity and
//!   variable name mappings
//! - **Views**: column selection or derivation, row filtering and entity
//!   renumbering over one table or a join
//! - **Joins**: the union of several tables of one entity type
//! - **Entity lists**: cached and paged enumeration of derived tables
//! - **Registry**: resolution of `datasource.table` references
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera_common::types::{Value, ValueType};
//! use tessera_core::{MemoryTable, ValueTable, Variable, View, Where};
//! use tessera_core::clause::EntityIdWhere;
//!
//! let a = MemoryTable::builder("A", "Participant")
//!     .variable(Variable::new("AGE", ValueType::Integer, "Participant"))
//!     .build();
//! a.insert("1", [("AGE", Value::integer(42))]).unwrap();
//! let b = MemoryTable::builder("B", "Participant")
//!     .variable(Variable::new("SEX", ValueType::Text, "Participant"))
//!     .build();
//! b.insert("2", [("SEX", Value::text("F"))]).unwrap();
//!
//! let view = View::builder("Everyone")
//!     .from(Arc::new(a))
//!     .from(Arc::new(b))
//!     .where_clause(Where::predicate(EntityIdWhere::new(["2"])))
//!     .build()
//!     .unwrap();
//! assert_eq!(view.variables().unwrap().len(), 2);
//! assert_eq!(view.variable_entity_count().unwrap(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// View clauses
pub mod clause;

/// Entity list caching and paging
pub mod entities;

/// Join tables
pub mod join;

/// Paired mapping functions
pub mod mapping;

/// In-memory physical tables
pub mod memory;

/// Datasource registry
pub mod registry;

/// The table contract
pub mod table;

/// Transforming table wrapper
pub mod transform;

/// Variables
pub mod variable;

/// Views
pub mod view;

pub use clause::{ColumnClause, ListClause, Select, SelectClause, Where, WhereClause};
pub use entities::{EntityCache, EntityListProvider, EntityStore, MemoryEntityStore};
pub use join::JoinTable;
pub use mapping::MappingFunction;
pub use memory::MemoryTable;
pub use registry::{Datasource, MemoryDatasource, Registry, TableReference};
pub use table::{TableRef, ValueSet, ValueTable, VariableValueSource};
pub use transform::TransformingTable;
pub use variable::{Category, Variable};
pub use view::{View, ViewBuilder};
