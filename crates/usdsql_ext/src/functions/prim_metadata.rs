use usdsql_core::usd::WalkedPrim;

use crate::host::{ColumnDef, Row};
use crate::projector::PrimProjector;

/// `usd_prim_metadata(path)`: hierarchy and composition metadata per prim.
#[derive(Default)]
pub struct PrimMetadataProjector;

impl PrimProjector for PrimMetadataProjector {
    const NAME: &'static str = "usd_prim_metadata";

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::varchar("prim_path"),
            ColumnDef::varchar("parent_path"),
            ColumnDef::varchar("name"),
            ColumnDef::varchar("prim_type"),
            ColumnDef::varchar("kind"),
            ColumnDef::boolean("active"),
            ColumnDef::boolean("instanceable"),
        ]
    }

    fn project(&mut self, walked: &WalkedPrim, out: &mut Vec<Row>) {
        let prim = walked.prim();
        let path = walked.path();
        // Root-level prims are parented to the pseudo-root
        let parent_path = match path.rsplit_once('/') {
            Some((parent, _)) if !parent.is_empty() => parent,
            _ => "/",
        };

        out.push(vec![
            path.into(),
            parent_path.into(),
            prim.name().into(),
            prim.type_name().into(),
            prim.kind().unwrap_or("").into(),
            prim.is_active().into(),
            prim.is_instanceable().into(),
        ]);
    }
}
