//! Variable descriptors.
//!
//! A variable is a named, typed column of a table. Its name is unique
//! within one table; the same name may appear in several tables, and a
//! join decides whether those definitions are compatible through their
//! [`JoinVariableKey`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tessera_common::types::ValueType;

/// One category of a categorical variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    /// Category code.
    pub name: String,
    /// Whether this code stands for a missing answer.
    pub missing: bool,
}

impl Category {
    /// Creates a regular category.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            missing: false,
        }
    }

    /// Creates a category flagging a missing answer.
    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            missing: true,
        }
    }
}

/// A column descriptor.
///
/// # Example
///
/// ```rust
/// use tessera_common::types::ValueType;
/// use tessera_core::variable::{Category, Variable};
///
/// let var = Variable::new("SMOKER", ValueType::Text, "Participant")
///     .with_category(Category::new("Y"))
///     .with_category(Category::missing("DK"));
///
/// assert_eq!(var.name(), "SMOKER");
/// assert!(!var.is_repeatable());
/// assert_eq!(var.categories().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    value_type: ValueType,
    entity_type: String,
    repeatable: bool,
    categories: Vec<Category>,
    unit: Option<String>,
    index: usize,
}

impl Variable {
    /// Creates a non-repeatable variable without categories.
    pub fn new(
        name: impl Into<String>,
        value_type: ValueType,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            entity_type: entity_type.into(),
            repeatable: false,
            categories: Vec::new(),
            unit: None,
            index: 0,
        }
    }

    /// Sets whether the variable holds a sequence of values per row.
    #[must_use]
    pub fn repeatable(mut self, repeatable: bool) -> Self {
        self.repeatable = repeatable;
        self
    }

    /// Adds a category.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.push(category);
        self
    }

    /// Sets the measurement unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the position of the variable within its table.
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Returns a copy of this variable under another name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Returns the variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns the entity type of the rows this variable describes.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns true if each row holds a sequence of values.
    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    /// Returns the categories.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Returns the measurement unit.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Returns the position of the variable within its table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the value a row without data holds for this variable.
    pub fn null_value(&self) -> tessera_common::Value {
        if self.repeatable {
            self.value_type.null_sequence()
        } else {
            self.value_type.null_value()
        }
    }

    /// Returns the key used to check compatibility across join members.
    pub fn join_key(&self) -> JoinVariableKey {
        JoinVariableKey {
            name: self.name.clone(),
            value_type: self.value_type,
            repeatable: self.repeatable,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.join_key())
    }
}

/// The part of a variable definition join members must agree on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinVariableKey {
    /// Variable name.
    pub name: String,
    /// Value type.
    pub value_type: ValueType,
    /// Repeatable flag.
    pub repeatable: bool,
}

impl fmt::Display for JoinVariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.value_type)?;
        if self.repeatable {
            write!(f, "[]")?;
        }
        Ok(())
    }
}
