//! Scalar values and column types exchanged with the host.

use std::fmt;

/// Logical column types understood by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Varchar,
    Boolean,
    Integer,
    Double,
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalType::Varchar => "VARCHAR",
            LogicalType::Boolean => "BOOLEAN",
            LogicalType::Integer => "INTEGER",
            LogicalType::Double => "DOUBLE",
        };
        f.write_str(name)
    }
}

/// A single nullable scalar.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Varchar(String),
    Boolean(bool),
    Integer(i32),
    Double(f64),
}

impl Value {
    /// The logical type of the value, `None` for NULL.
    pub fn logical_type(&self) -> Option<LogicalType> {
        match self {
            Value::Null => None,
            Value::Varchar(_) => Some(LogicalType::Varchar),
            Value::Boolean(_) => Some(LogicalType::Boolean),
            Value::Integer(_) => Some(LogicalType::Integer),
            Value::Double(_) => Some(LogicalType::Double),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Varchar(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Varchar(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Varchar(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
        }
    }
}

/// One output column of a table function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub logical_type: LogicalType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
        }
    }

    pub fn varchar(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Varchar)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Boolean)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Integer)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Double)
    }
}

/// A row of values in schema order.
pub type Row = Vec<Value>;
