//! Typed values held by table cells.
//!
//! Every value carries its [`ValueType`], including nulls, so that a table
//! can answer "the null value of this variable" without a row. Repeatable
//! variables hold [`Value::Sequence`]s; a sequence whose `values` is `None`
//! is the null sequence.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type of a variable's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Unicode text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Decimal,
    /// Boolean.
    Boolean,
    /// Date (days since epoch).
    Date,
    /// Date and time (microseconds since epoch).
    DateTime,
    /// Binary data.
    Binary,
}

impl ValueType {
    /// Returns the null value of this type.
    #[must_use]
    pub const fn null_value(self) -> Value {
        Value::Null(self)
    }

    /// Returns the null sequence of this type.
    #[must_use]
    pub const fn null_sequence(self) -> Value {
        Value::Sequence {
            value_type: self,
            values: None,
        }
    }

    /// Returns the lowercase type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value of a given type.
    Null(ValueType),
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Decimal value.
    Decimal(f64),
    /// Boolean value.
    Boolean(bool),
    /// Date (days since epoch).
    Date(i32),
    /// Date and time (microseconds since epoch).
    DateTime(i64),
    /// Binary data.
    Binary(Vec<u8>),
    /// Ordered values of a repeatable variable, or the null sequence.
    Sequence {
        /// Type of the elements.
        value_type: ValueType,
        /// The elements, `None` for the null sequence.
        values: Option<Vec<Value>>,
    },
}

impl Value {
    /// Creates a text value.
    pub fn text(v: impl Into<String>) -> Self {
        Value::Text(v.into())
    }

    /// Creates an integer value.
    pub fn integer(v: i64) -> Self {
        Value::Integer(v)
    }

    /// Creates a decimal value.
    pub fn decimal(v: f64) -> Self {
        Value::Decimal(v)
    }

    /// Creates a boolean value.
    pub fn boolean(v: bool) -> Self {
        Value::Boolean(v)
    }

    /// Creates a sequence of values of the given type.
    pub fn sequence(value_type: ValueType, values: Vec<Value>) -> Self {
        Value::Sequence {
            value_type,
            values: Some(values),
        }
    }

    /// Returns the type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null(t) | Value::Sequence { value_type: t, .. } => *t,
            Value::Text(_) => ValueType::Text,
            Value::Integer(_) => ValueType::Integer,
            Value::Decimal(_) => ValueType::Decimal,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Date(_) => ValueType::Date,
            Value::DateTime(_) => ValueType::DateTime,
            Value::Binary(_) => ValueType::Binary,
        }
    }

    /// Returns true for a null value or the null sequence.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_) | Value::Sequence { values: None, .. })
    }

    /// Returns true if this value is a sequence (null or not).
    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence { .. })
    }

    /// Returns the elements of a non-null sequence.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence {
                values: Some(values),
                ..
            } => Some(values),
            _ => None,
        }
    }

    /// Returns the text of a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer of an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean of a boolean value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(_) | Value::Sequence { values: None, .. } => write!(f, "NULL"),
            Value::Text(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "date:{}", d),
            Value::DateTime(t) => write!(f, "ts:{}", t),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Value::Sequence {
                values: Some(values),
                ..
            } => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}
