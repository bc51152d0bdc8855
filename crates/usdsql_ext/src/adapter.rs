//! Bridges a lazy prim walk to the host's chunk-at-a-time protocol.
//!
//! A scan moves through three phases:
//!
//! - `Pending`: bound and initialised, nothing opened yet
//! - `Scanning`: the asset is open and the walker is live
//! - `Finished`: exhausted, cancelled, limited or failed; nothing is held
//!
//! The asset is opened on the first `execute` and released as soon as the
//! scan leaves `Scanning`, whichever way it leaves.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use usdsql_core::usd::{Asset, PrimWalker};

use crate::config::UsdConfig;
use crate::error::{FunctionError, FunctionResult};
use crate::host::{
    BoundTableFunction, CancellationToken, ColumnDef, DataChunk, InitInput, LogicalType, Row,
    TableFunction, TableScan, Value,
};
use crate::projector::PrimProjector;

/// A `(path VARCHAR)` table function driven by projector `P`.
pub struct PrimTableFunction<P> {
    config: Arc<UsdConfig>,
    _projector: PhantomData<fn() -> P>,
}

impl<P: PrimProjector> PrimTableFunction<P> {
    pub fn new(config: Arc<UsdConfig>) -> Self {
        Self {
            config,
            _projector: PhantomData,
        }
    }
}

impl<P: PrimProjector> TableFunction for PrimTableFunction<P> {
    fn name(&self) -> &str {
        P::NAME
    }

    fn arguments(&self) -> Vec<LogicalType> {
        vec![LogicalType::Varchar]
    }

    fn bind(&self, args: &[Value]) -> FunctionResult<Box<dyn BoundTableFunction>> {
        let path = match args {
            [Value::Varchar(path)] if path.trim().is_empty() => {
                return Err(FunctionError::invalid_argument(P::NAME, "file_path cannot be empty"));
            }
            [Value::Varchar(path)] => path.clone(),
            [Value::Null] => {
                return Err(FunctionError::invalid_argument(P::NAME, "file_path cannot be NULL"));
            }
            [other] => {
                return Err(FunctionError::invalid_argument(
                    P::NAME,
                    format!("file_path must be a VARCHAR, got {:?}", other),
                ));
            }
            _ => {
                return Err(FunctionError::invalid_argument(
                    P::NAME,
                    format!("expected exactly one argument (file_path), got {}", args.len()),
                ));
            }
        };

        Ok(Box::new(BoundPrimFunction::<P> {
            path,
            schema: P::columns(),
            config: Arc::clone(&self.config),
            _projector: PhantomData,
        }))
    }
}

struct BoundPrimFunction<P> {
    path: String,
    schema: Vec<ColumnDef>,
    config: Arc<UsdConfig>,
    _projector: PhantomData<fn() -> P>,
}

impl<P: PrimProjector> BoundTableFunction for BoundPrimFunction<P> {
    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn init(&self, input: InitInput) -> FunctionResult<Box<dyn TableScan>> {
        Ok(Box::new(PrimScan::<P>::new(
            self.path.clone(),
            Arc::clone(&self.config),
            input,
        )))
    }
}

enum ScanPhase {
    Pending,
    Scanning { asset: Asset, walker: PrimWalker },
    Finished,
}

/// Scan state of one table-function invocation.
///
/// Dropping the scan drops the asset, which releases the stage.
pub struct PrimScan<P> {
    path: String,
    config: Arc<UsdConfig>,
    phase: ScanPhase,
    projector: P,
    pending: VecDeque<Row>,
    scratch: Vec<Row>,
    limit: Option<usize>,
    produced: usize,
    visited: usize,
    cancel: CancellationToken,
}

impl<P: PrimProjector> PrimScan<P> {
    pub fn new(path: String, config: Arc<UsdConfig>, input: InitInput) -> Self {
        Self {
            path,
            config,
            phase: ScanPhase::Pending,
            projector: P::default(),
            pending: VecDeque::new(),
            scratch: Vec::new(),
            limit: input.limit,
            produced: 0,
            visited: 0,
            cancel: input.cancel,
        }
    }

    /// Prims pulled from the walker so far.
    pub fn prims_visited(&self) -> usize {
        self.visited
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, ScanPhase::Finished)
    }

    fn limit_reached(&self) -> bool {
        self.limit.map(|limit| self.produced >= limit).unwrap_or(false)
    }

    fn open(&mut self) -> FunctionResult<()> {
        let asset = Asset::open(&self.path, &self.config.reader_options())?;
        let walker = asset.traverse(&self.config.traversal)?;
        log::debug!("{}: scanning {}", P::NAME, self.path);
        self.phase = ScanPhase::Scanning { asset, walker };
        Ok(())
    }

    /// Leave the scan finished, dropping the asset if one is held.
    fn finish(&mut self, reason: &str) {
        let previous = std::mem::replace(&mut self.phase, ScanPhase::Finished);
        self.pending.clear();
        if let ScanPhase::Scanning { mut asset, walker } = previous {
            drop(walker);
            asset.close();
            log::debug!(
                "{}: {} after {} prims, {} rows",
                P::NAME,
                reason,
                self.visited,
                self.produced
            );
        }
    }

    fn fail(&mut self, error: FunctionError) -> FunctionResult<()> {
        self.finish("failed");
        Err(error)
    }
}

impl<P: PrimProjector> TableScan for PrimScan<P> {
    fn execute(&mut self, output: &mut DataChunk) -> FunctionResult<()> {
        loop {
            if self.is_finished() {
                return Ok(());
            }
            if self.cancel.is_cancelled() {
                self.finish("cancelled");
                return Ok(());
            }

            while !output.is_full() && !self.limit_reached() {
                let Some(row) = self.pending.pop_front() else {
                    break;
                };
                if let Err(e) = output.push_row(row) {
                    return self.fail(e.into());
                }
                self.produced += 1;
            }

            if self.limit_reached() {
                self.finish("limit reached");
                return Ok(());
            }
            if output.is_full() {
                return Ok(());
            }

            if matches!(self.phase, ScanPhase::Pending) {
                if let Err(e) = self.open() {
                    return self.fail(e);
                }
                continue;
            }

            let step = match &mut self.phase {
                ScanPhase::Scanning { walker, .. } => walker.next(),
                _ => return Ok(()),
            };

            match step {
                None => {
                    self.finish("exhausted");
                    return Ok(());
                }
                Some(Err(e)) => return self.fail(e.into()),
                Some(Ok(prim)) => {
                    self.visited += 1;
                    self.projector.project(&prim, &mut self.scratch);
                    self.pending.extend(self.scratch.drain(..));
                }
            }
        }
    }

    fn cleanup(&mut self) {
        self.finish("cleanup");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::functions::PrimsProjector;
    use std::io::Write;
    use std::path::PathBuf;
    use usdsql_core::usd::WalkedPrim;

    const CHAIN: &str = r#"#usda 1.0
def Xform "A"
{
    def Xform "B"
    {
        def Xform "C"
        {
            def Xform "D" {}
        }
    }
}
def Xform "E" {}
"#;

    fn write_asset(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("usdsql_adapter_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        path
    }

    fn scan(path: &PathBuf, input: InitInput) -> PrimScan<PrimsProjector> {
        PrimScan::new(
            path.to_string_lossy().into_owned(),
            Arc::new(UsdConfig::default()),
            input,
        )
    }

    fn chunk() -> DataChunk {
        DataChunk::new(&[LogicalType::Varchar, LogicalType::Varchar])
    }

    #[test]
    fn test_bind_validates_arguments() {
        let function = PrimTableFunction::<PrimsProjector>::new(Arc::new(UsdConfig::default()));

        for args in [
            vec![],
            vec![Value::Null],
            vec![Value::Integer(1)],
            vec![Value::from("   ")],
            vec![Value::from("a.usda"), Value::from("b.usda")],
        ] {
            let err = function.bind(&args).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{:?}", args);
        }

        let bound = function.bind(&[Value::from("/no/such/file.usda")]).unwrap();
        assert_eq!(bound.schema().len(), 2);
    }

    #[test]
    fn test_limit_stops_walk() {
        let path = write_asset("chain.usda", CHAIN);
        let mut scan = scan(
            &path,
            InitInput {
                limit: Some(2),
                ..Default::default()
            },
        );

        let mut output = chunk();
        scan.execute(&mut output).unwrap();
        assert_eq!(output.cardinality(), 2);
        assert_eq!(scan.prims_visited(), 2);
        assert!(scan.is_finished());

        output.reset();
        scan.execute(&mut output).unwrap();
        assert_eq!(output.cardinality(), 0);
    }

    #[test]
    fn test_zero_limit_does_no_io() {
        let mut scan = scan(
            &PathBuf::from("/no/such/file.usda"),
            InitInput {
                limit: Some(0),
                ..Default::default()
            },
        );
        let mut output = chunk();
        scan.execute(&mut output).unwrap();
        assert_eq!(output.cardinality(), 0);
        assert_eq!(scan.prims_visited(), 0);
    }

    #[test]
    fn test_small_chunks_keep_order() {
        let path = write_asset("chain_small.usda", CHAIN);
        let mut scan = scan(&path, InitInput::default());
        let mut output = DataChunk::with_capacity(&[LogicalType::Varchar, LogicalType::Varchar], 2);

        let mut paths = Vec::new();
        loop {
            output.reset();
            scan.execute(&mut output).unwrap();
            if output.cardinality() == 0 {
                break;
            }
            paths.extend(output.rows().map(|row| row[0].to_string()));
        }
        assert_eq!(paths, vec!["/A", "/A/B", "/A/B/C", "/A/B/C/D", "/E"]);
    }

    #[test]
    fn test_cancel_stops_scan() {
        let path = write_asset("chain_cancel.usda", CHAIN);
        let cancel = CancellationToken::new();
        let mut scan = scan(
            &path,
            InitInput {
                limit: None,
                cancel: cancel.clone(),
            },
        );

        cancel.cancel();
        let mut output = chunk();
        scan.execute(&mut output).unwrap();
        assert_eq!(output.cardinality(), 0);
        assert_eq!(scan.prims_visited(), 0);
        assert!(scan.is_finished());
    }

    #[test]
    fn test_not_found_finishes_scan() {
        let mut scan = scan(&PathBuf::from("/no/such/file.usda"), InitInput::default());
        let err = scan.execute(&mut chunk()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(scan.is_finished());
    }

    #[test]
    fn test_stale_stage_is_fatal() {
        let path = write_asset("chain_stale.usda", CHAIN);
        let mut scan = scan(&path, InitInput::default());
        let mut output = DataChunk::with_capacity(&[LogicalType::Varchar, LogicalType::Varchar], 1);
        scan.execute(&mut output).unwrap();
        assert_eq!(output.cardinality(), 1);

        if let ScanPhase::Scanning { asset, .. } = &mut scan.phase {
            asset.close();
        }

        output.reset();
        let err = scan.execute(&mut output).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleHandle);
        assert!(scan.is_finished());
    }

    /// Emits three rows per prim to exercise the pending queue.
    #[derive(Default)]
    struct Triple;

    impl PrimProjector for Triple {
        const NAME: &'static str = "triple";

        fn columns() -> Vec<ColumnDef> {
            vec![ColumnDef::varchar("path"), ColumnDef::integer("n")]
        }

        fn project(&mut self, prim: &WalkedPrim, out: &mut Vec<Row>) {
            for n in 0..3 {
                out.push(vec![prim.path().into(), Value::Integer(n)]);
            }
        }
    }

    #[test]
    fn test_pending_rows_carry_over() {
        let path = write_asset("chain_triple.usda", CHAIN);
        let mut scan = PrimScan::<Triple>::new(
            path.to_string_lossy().into_owned(),
            Arc::new(UsdConfig::default()),
            InitInput::default(),
        );
        let types = [LogicalType::Varchar, LogicalType::Integer];
        let mut output = DataChunk::with_capacity(&types, 4);

        scan.execute(&mut output).unwrap();
        assert_eq!(output.cardinality(), 4);
        assert_eq!(scan.prims_visited(), 2);

        let mut total = 4;
        loop {
            output.reset();
            scan.execute(&mut output).unwrap();
            if output.cardinality() == 0 {
                break;
            }
            total += output.cardinality();
        }
        assert_eq!(total, 15);
    }
}
