//! Columnar output batches.

use std::fmt;

use thiserror::Error;

use super::value::{LogicalType, Row, Value};

/// Maximum number of rows in one chunk.
pub const STANDARD_VECTOR_SIZE: usize = 2048;

/// Errors raised when appending to a chunk.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChunkError {
    #[error("Chunk is full ({0} rows)")]
    Full(usize),

    #[error("Row has {actual} values, chunk has {expected} columns")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Column {column} expects {expected}, got {actual:?}")]
    TypeMismatch {
        column: usize,
        expected: LogicalType,
        actual: Value,
    },
}

/// A typed column of nullable values.
#[derive(Clone, Debug, PartialEq)]
pub enum Vector {
    Varchar(Vec<Option<String>>),
    Boolean(Vec<Option<bool>>),
    Integer(Vec<Option<i32>>),
    Double(Vec<Option<f64>>),
}

impl Vector {
    fn with_capacity(logical_type: LogicalType, capacity: usize) -> Self {
        match logical_type {
            LogicalType::Varchar => Vector::Varchar(Vec::with_capacity(capacity)),
            LogicalType::Boolean => Vector::Boolean(Vec::with_capacity(capacity)),
            LogicalType::Integer => Vector::Integer(Vec::with_capacity(capacity)),
            LogicalType::Double => Vector::Double(Vec::with_capacity(capacity)),
        }
    }

    pub fn logical_type(&self) -> LogicalType {
        match self {
            Vector::Varchar(_) => LogicalType::Varchar,
            Vector::Boolean(_) => LogicalType::Boolean,
            Vector::Integer(_) => LogicalType::Integer,
            Vector::Double(_) => LogicalType::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Vector::Varchar(v) => v.len(),
            Vector::Boolean(v) => v.len(),
            Vector::Integer(v) => v.len(),
            Vector::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the value at `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<Value> {
        let value = match self {
            Vector::Varchar(v) => v.get(index)?.clone().map(Value::Varchar),
            Vector::Boolean(v) => v.get(index)?.map(Value::Boolean),
            Vector::Integer(v) => v.get(index)?.map(Value::Integer),
            Vector::Double(v) => v.get(index)?.map(Value::Double),
        };
        Some(value.unwrap_or(Value::Null))
    }

    fn accepts(&self, value: &Value) -> bool {
        value
            .logical_type()
            .map(|ty| ty == self.logical_type())
            .unwrap_or(true)
    }

    fn push(&mut self, value: Value) {
        match (self, value) {
            (Vector::Varchar(v), Value::Varchar(s)) => v.push(Some(s)),
            (Vector::Boolean(v), Value::Boolean(b)) => v.push(Some(b)),
            (Vector::Integer(v), Value::Integer(i)) => v.push(Some(i)),
            (Vector::Double(v), Value::Double(d)) => v.push(Some(d)),
            (Vector::Varchar(v), _) => v.push(None),
            (Vector::Boolean(v), _) => v.push(None),
            (Vector::Integer(v), _) => v.push(None),
            (Vector::Double(v), _) => v.push(None),
        }
    }

    fn clear(&mut self) {
        match self {
            Vector::Varchar(v) => v.clear(),
            Vector::Boolean(v) => v.clear(),
            Vector::Integer(v) => v.clear(),
            Vector::Double(v) => v.clear(),
        }
    }
}

/// A horizontal slice of a table function's output, stored by column.
#[derive(Clone, Debug, PartialEq)]
pub struct DataChunk {
    columns: Vec<Vector>,
    capacity: usize,
}

impl DataChunk {
    /// Create an empty chunk of [`STANDARD_VECTOR_SIZE`] rows.
    pub fn new(types: &[LogicalType]) -> Self {
        Self::with_capacity(types, STANDARD_VECTOR_SIZE)
    }

    pub fn with_capacity(types: &[LogicalType], capacity: usize) -> Self {
        Self {
            columns: types
                .iter()
                .map(|&ty| Vector::with_capacity(ty, capacity))
                .collect(),
            capacity,
        }
    }

    /// Number of rows in the chunk.
    pub fn cardinality(&self) -> usize {
        self.columns.first().map(Vector::len).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_full(&self) -> bool {
        self.cardinality() >= self.capacity
    }

    pub fn column(&self, index: usize) -> Option<&Vector> {
        self.columns.get(index)
    }

    /// Append one row. The row is checked before any column is touched.
    pub fn push_row(&mut self, row: Row) -> Result<(), ChunkError> {
        if self.is_full() {
            return Err(ChunkError::Full(self.capacity));
        }
        if row.len() != self.columns.len() {
            return Err(ChunkError::ArityMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        for (column, (vector, value)) in self.columns.iter().zip(&row).enumerate() {
            if !vector.accepts(value) {
                return Err(ChunkError::TypeMismatch {
                    column,
                    expected: vector.logical_type(),
                    actual: value.clone(),
                });
            }
        }

        for (vector, value) in self.columns.iter_mut().zip(row) {
            vector.push(value);
        }
        Ok(())
    }

    /// Materialise row `index`.
    pub fn row(&self, index: usize) -> Option<Row> {
        self.columns.iter().map(|c| c.get(index)).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.cardinality()).filter_map(move |i| self.row(i))
    }

    /// Drop all rows, keeping the schema and allocations.
    pub fn reset(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
    }
}

/// Tab-separated rows, one per line.
impl fmt::Display for DataChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line: Vec<String> = row.iter().map(Value::to_string).collect();
            writeln!(f, "{}", line.join("\t"))?;
        }
        Ok(())
    }
}
