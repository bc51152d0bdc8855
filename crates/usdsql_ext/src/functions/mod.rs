//! The USD table functions, one projector each.

mod prims;
mod prim_metadata;
mod properties;
mod relationships;
mod xforms;

pub use prims::PrimsProjector;
pub use prim_metadata::PrimMetadataProjector;
pub use properties::PropertiesProjector;
pub use relationships::RelationshipsProjector;
pub use xforms::XformsProjector;

#[cfg(test)]
pub(crate) mod test_util {
    use usdsql_core::usd::{Asset, WalkOptions};

    use crate::host::Row;
    use crate::projector::PrimProjector;

    /// Project every prim of an in-memory layer.
    pub fn project_all<P: PrimProjector>(usda: &str) -> Vec<Row> {
        let asset = Asset::from_string("test", usda).unwrap();
        let mut projector = P::default();
        let mut rows = Vec::new();
        for prim in asset.traverse(&WalkOptions::default()).unwrap() {
            projector.project(&prim.unwrap(), &mut rows);
        }
        rows
    }
}
