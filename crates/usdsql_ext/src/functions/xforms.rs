use std::collections::HashMap;

use glam::{DMat3, DMat4};
use usdsql_core::usd::{Prim, PrimId, WalkedPrim};

use crate::host::{ColumnDef, Row};
use crate::projector::PrimProjector;

/// Tolerance used when comparing decomposed transforms with identity.
const EPSILON: f64 = 1e-6;

/// `usd_xforms(path)`: world-space translation of every xformable prim.
///
/// World matrices are cached per prim for the lifetime of the scan, so each
/// parent chain is composed once.
#[derive(Default)]
pub struct XformsProjector {
    world: HashMap<PrimId, DMat4>,
}

impl XformsProjector {
    fn world_transform(&mut self, prim: Prim<'_>) -> DMat4 {
        // Collect the ancestor chain up to a cached matrix or a reset
        let mut chain = Vec::new();
        let mut base = DMat4::IDENTITY;
        let mut current = Some(prim);
        while let Some(p) = current {
            if let Some(matrix) = self.world.get(&p.id()) {
                base = *matrix;
                break;
            }
            let (local, resets) = p.local_transform();
            chain.push((p.id(), local));
            current = if resets { None } else { p.parent() };
        }

        let mut world = base;
        for (id, local) in chain.into_iter().rev() {
            world *= local;
            self.world.insert(id, world);
        }
        world
    }
}

impl PrimProjector for XformsProjector {
    const NAME: &'static str = "usd_xforms";

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::varchar("prim_path"),
            ColumnDef::double("x"),
            ColumnDef::double("y"),
            ColumnDef::double("z"),
            ColumnDef::boolean("has_rotation"),
            ColumnDef::boolean("has_scale"),
        ]
    }

    fn project(&mut self, walked: &WalkedPrim, out: &mut Vec<Row>) {
        let prim = walked.prim();
        if !prim.is_xformable() {
            return;
        }

        let world = self.world_transform(prim);
        let (scale, rotation, translation) = world.to_scale_rotation_translation();

        let has_rotation = !DMat3::from_quat(rotation).abs_diff_eq(DMat3::IDENTITY, EPSILON);
        let has_scale = !scale.abs_diff_eq(glam::DVec3::ONE, EPSILON);

        out.push(vec![
            walked.path().into(),
            translation.x.into(),
            translation.y.into(),
            translation.z.into(),
            has_rotation.into(),
            has_scale.into(),
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_util::project_all;
    use crate::host::Value;

    fn approx(value: &Value, expected: f64) -> bool {
        value.as_f64().map(|v| (v - expected).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn test_world_translation_accumulates() {
        let rows = project_all::<XformsProjector>(
            r#"#usda 1.0
def Xform "World"
{
    double3 xformOp:translate = (1, 0, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Scope "Looks" {}

    def Xform "Child"
    {
        double3 xformOp:translate = (0, 2, 0)
        float xformOp:rotateZ = 90
        uniform token[] xformOpOrder = ["xformOp:translate", "xformOp:rotateZ"]

        def Cube "Box"
        {
            float3 xformOp:scale = (2, 2, 2)
            uniform token[] xformOpOrder = ["xformOp:scale"]
        }
    }
}
"#,
        );

        // Scope is not xformable
        assert_eq!(rows.len(), 3);

        let world = &rows[0];
        assert_eq!(world[0], Value::from("/World"));
        assert!(approx(&world[1], 1.0) && approx(&world[2], 0.0) && approx(&world[3], 0.0));
        assert_eq!(world[4], Value::Boolean(false));
        assert_eq!(world[5], Value::Boolean(false));

        let child = &rows[1];
        assert!(approx(&child[1], 1.0) && approx(&child[2], 2.0));
        assert_eq!(child[4], Value::Boolean(true));
        assert_eq!(child[5], Value::Boolean(false));

        let boxed = &rows[2];
        assert_eq!(boxed[0], Value::from("/World/Child/Box"));
        assert!(approx(&boxed[1], 1.0) && approx(&boxed[2], 2.0));
        assert_eq!(boxed[4], Value::Boolean(true));
        assert_eq!(boxed[5], Value::Boolean(true));
    }

    #[test]
    fn test_reset_xform_stack_ignores_parent() {
        let rows = project_all::<XformsProjector>(
            r#"#usda 1.0
def Xform "Parent"
{
    double3 xformOp:translate = (10, 0, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Xform "Detached"
    {
        double3 xformOp:translate = (0, 0, 3)
        uniform token[] xformOpOrder = ["!resetXformStack!", "xformOp:translate"]
    }
}
"#,
        );

        let detached = &rows[1];
        assert!(approx(&detached[1], 0.0) && approx(&detached[3], 3.0));
    }

    #[test]
    fn test_ops_without_order_are_ignored() {
        let rows = project_all::<XformsProjector>(
            r#"#usda 1.0
def Xform "Root"
{
    double3 xformOp:translate = (5, 0, 0)

    def Xform "Child"
    {
        double3 xformOp:translate = (0, 1, 0)
        uniform token[] xformOpOrder = ["xformOp:translate"]
    }
}
"#,
        );

        assert!(approx(&rows[0][1], 0.0) && approx(&rows[0][2], 0.0));
        assert!(approx(&rows[1][1], 0.0) && approx(&rows[1][2], 1.0));
    }

    #[test]
    fn test_deep_hierarchy() {
        let depth = 5_000;
        let mut usda = String::from("#usda 1.0\n");
        for _ in 0..depth {
            usda.push_str("def Xform \"X\" {\n");
            usda.push_str("double3 xformOp:translate = (1, 0, 0)\n");
            usda.push_str("uniform token[] xformOpOrder = [\"xformOp:translate\"]\n");
        }
        usda.push_str(&"}\n".repeat(depth));

        let rows = project_all::<XformsProjector>(&usda);
        assert_eq!(rows.len(), depth);
        assert!(approx(&rows[depth - 1][1], depth as f64));
    }
}
