//! Conversion of walked prims into rows.

use usdsql_core::usd::WalkedPrim;

use crate::host::{ColumnDef, Row};

/// Turns each walked prim into zero or more rows of a fixed schema.
///
/// Projection cannot fail: data that is missing or malformed on the prim
/// is reported with a default value.
pub trait PrimProjector: Default + Send + 'static {
    /// Table function name, e.g. `usd_prims`.
    const NAME: &'static str;

    fn columns() -> Vec<ColumnDef>;

    /// Append the rows for `prim` to `out`.
    fn project(&mut self, prim: &WalkedPrim, out: &mut Vec<Row>);
}
