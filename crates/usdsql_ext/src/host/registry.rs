//! Function catalog and the reference scan driver.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::chunk::DataChunk;
use super::function::{CancellationToken, InitInput, TableFunction};
use super::value::{ColumnDef, LogicalType, Row, Value};
use crate::error::{FunctionError, FunctionResult};

/// Options for one call to [`FunctionRegistry::run`].
#[derive(Clone, Debug, Default)]
pub struct ScanRequest {
    pub limit: Option<usize>,
    pub cancel: CancellationToken,
}

/// The complete result of a scan.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
    /// Number of non-empty chunks the scan produced
    pub chunks: usize,
}

impl QueryResult {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(index)).collect())
    }
}

/// Table functions by name.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn TableFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any function with the same name.
    pub fn register<F: TableFunction + 'static>(&mut self, function: F) {
        let name = function.name().to_string();
        if self
            .functions
            .insert(name.clone(), Arc::new(function))
            .is_some()
        {
            log::warn!("Replaced table function {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TableFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Bind, init and drain a table function.
    ///
    /// Rows collected before an error are discarded; the error is returned
    /// as the scan's only result. Cleanup runs on every path.
    pub fn run(&self, name: &str, args: &[Value], request: ScanRequest) -> FunctionResult<QueryResult> {
        let function = self
            .get(name)
            .ok_or_else(|| FunctionError::UnknownFunction(name.to_string()))?;

        let bound = function.bind(args)?;
        let columns = bound.schema().to_vec();
        let types: Vec<LogicalType> = columns.iter().map(|c| c.logical_type).collect();

        let mut scan = bound.init(InitInput {
            limit: request.limit,
            cancel: request.cancel,
        })?;

        let mut rows = Vec::new();
        let mut chunks = 0;
        let mut chunk = DataChunk::new(&types);
        let outcome = loop {
            chunk.reset();
            if let Err(e) = scan.execute(&mut chunk) {
                break Err(e);
            }
            if chunk.cardinality() == 0 {
                break Ok(());
            }
            chunks += 1;
            rows.extend(chunk.rows());
        };
        scan.cleanup();

        if let Err(e) = outcome {
            log::debug!("{} failed after {} rows: {}", name, rows.len(), e);
            return Err(e);
        }

        if let Some(limit) = request.limit {
            rows.truncate(limit);
        }

        Ok(QueryResult {
            columns,
            rows,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{BoundTableFunction, TableScan};

    /// Emits `0..total`, failing once `fail_at` rows were produced.
    struct Sequence {
        total: i32,
        fail_at: Option<i32>,
    }

    struct SequenceScan {
        next: i32,
        total: i32,
        fail_at: Option<i32>,
        cleaned: bool,
    }

    impl TableFunction for Sequence {
        fn name(&self) -> &str {
            "sequence"
        }

        fn arguments(&self) -> Vec<LogicalType> {
            Vec::new()
        }

        fn bind(&self, _args: &[Value]) -> FunctionResult<Box<dyn BoundTableFunction>> {
            Ok(Box::new(BoundSequence {
                total: self.total,
                fail_at: self.fail_at,
                schema: vec![ColumnDef::integer("n")],
            }))
        }
    }

    struct BoundSequence {
        total: i32,
        fail_at: Option<i32>,
        schema: Vec<ColumnDef>,
    }

    impl BoundTableFunction for BoundSequence {
        fn schema(&self) -> &[ColumnDef] {
            &self.schema
        }

        fn init(&self, _input: InitInput) -> FunctionResult<Box<dyn TableScan>> {
            Ok(Box::new(SequenceScan {
                next: 0,
                total: self.total,
                fail_at: self.fail_at,
                cleaned: false,
            }))
        }
    }

    impl TableScan for SequenceScan {
        fn execute(&mut self, output: &mut DataChunk) -> FunctionResult<()> {
            while !output.is_full() && self.next < self.total {
                if Some(self.next) == self.fail_at {
                    return Err(FunctionError::invalid_argument("sequence", "boom"));
                }
                output.push_row(vec![self.next.into()])?;
                self.next += 1;
            }
            Ok(())
        }

        fn cleanup(&mut self) {
            self.cleaned = true;
        }
    }

    #[test]
    fn test_run_spans_chunks() {
        let mut registry = FunctionRegistry::new();
        registry.register(Sequence {
            total: 5000,
            fail_at: None,
        });

        let result = registry.run("sequence", &[], ScanRequest::default()).unwrap();
        assert_eq!(result.rows.len(), 5000);
        assert_eq!(result.chunks, 3);
        assert_eq!(result.rows[4999], vec![Value::Integer(4999)]);
    }

    #[test]
    fn test_run_discards_partial_rows_on_error() {
        let mut registry = FunctionRegistry::new();
        registry.register(Sequence {
            total: 5000,
            fail_at: Some(3000),
        });

        let err = registry.run("sequence", &[], ScanRequest::default()).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::new();
        let err = registry.run("nope", &[], ScanRequest::default()).unwrap_err();
        assert!(matches!(err, FunctionError::UnknownFunction(_)));
    }

    #[test]
    fn test_host_enforces_limit() {
        let mut registry = FunctionRegistry::new();
        registry.register(Sequence {
            total: 10,
            fail_at: None,
        });

        let request = ScanRequest {
            limit: Some(4),
            ..Default::default()
        };
        let result = registry.run("sequence", &[], request).unwrap();
        assert_eq!(result.rows.len(), 4);
        assert_eq!(result.column("n").unwrap().len(), 4);
    }
}
