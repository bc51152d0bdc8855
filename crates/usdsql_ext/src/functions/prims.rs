use usdsql_core::usd::WalkedPrim;

use crate::host::{ColumnDef, Row};
use crate::projector::PrimProjector;

/// `usd_prims(path) -> (path, type_name)`: one row per prim.
#[derive(Default)]
pub struct PrimsProjector;

impl PrimProjector for PrimsProjector {
    const NAME: &'static str = "usd_prims";

    fn columns() -> Vec<ColumnDef> {
        vec![ColumnDef::varchar("path"), ColumnDef::varchar("type_name")]
    }

    fn project(&mut self, prim: &WalkedPrim, out: &mut Vec<Row>) {
        out.push(vec![
            prim.path().into(),
            prim.prim().type_name().into(),
        ]);
    }
}
