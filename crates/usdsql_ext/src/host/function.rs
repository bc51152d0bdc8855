//! Table-function protocol: bind, init, execute, cleanup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::chunk::DataChunk;
use super::value::{ColumnDef, LogicalType, Value};
use crate::error::FunctionResult;

/// Cooperative cancellation flag shared between the host and a scan.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Per-invocation inputs handed to [`BoundTableFunction::init`].
#[derive(Clone, Debug, Default)]
pub struct InitInput {
    /// Row limit pushed down from the query, if any
    pub limit: Option<usize>,

    pub cancel: CancellationToken,
}

/// A table function registered with the host.
pub trait TableFunction: Send + Sync {
    fn name(&self) -> &str;

    /// Positional argument types.
    fn arguments(&self) -> Vec<LogicalType>;

    /// Validate arguments and fix the output schema. Must not do I/O.
    fn bind(&self, args: &[Value]) -> FunctionResult<Box<dyn BoundTableFunction>>;
}

/// A table function whose arguments have been bound.
pub trait BoundTableFunction: Send {
    fn schema(&self) -> &[ColumnDef];

    /// Create the scan state for one invocation. Must not do I/O.
    fn init(&self, input: InitInput) -> FunctionResult<Box<dyn TableScan>>;
}

/// Pull-based scan state for one invocation.
pub trait TableScan: Send {
    /// Fill `output` with the next rows. Zero rows means the scan is done.
    fn execute(&mut self, output: &mut DataChunk) -> FunctionResult<()>;

    /// Release held resources. Safe to call more than once.
    fn cleanup(&mut self);
}
