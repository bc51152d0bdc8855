use usdsql_core::usd::{make_absolute_path, WalkedPrim};

use crate::host::{ColumnDef, Row, Value};
use crate::projector::PrimProjector;

/// `usd_relationships(path)`: one row per relationship target.
///
/// Relationships are listed by name; targets keep their authored order.
#[derive(Default)]
pub struct RelationshipsProjector;

impl PrimProjector for RelationshipsProjector {
    const NAME: &'static str = "usd_relationships";

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::varchar("prim_path"),
            ColumnDef::varchar("rel_name"),
            ColumnDef::varchar("target_path"),
            ColumnDef::integer("target_index"),
        ]
    }

    fn project(&mut self, walked: &WalkedPrim, out: &mut Vec<Row>) {
        let mut relationships: Vec<_> = walked
            .prim()
            .properties()
            .iter()
            .filter_map(|property| Some((property.name.as_str(), property.as_relationship()?)))
            .collect();
        relationships.sort_by(|a, b| a.0.cmp(b.0));

        for (name, rel) in relationships {
            for (index, target) in rel.targets.iter().enumerate() {
                out.push(vec![
                    walked.path().into(),
                    name.into(),
                    make_absolute_path(target, walked.path()).into(),
                    i32::try_from(index).map(Value::Integer).unwrap_or(Value::Null),
                ]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_util::project_all;

    #[test]
    fn test_relationships_sorted_targets_in_order() {
        let rows = project_all::<RelationshipsProjector>(
            r#"#usda 1.0
def Xform "World"
{
    rel proxyPrim
    def Mesh "Mesh"
    {
        rel material:binding = </Looks/Red>
        rel lights = [<../Key>, </World/Fill>]
    }
}
"#,
        );

        assert_eq!(
            rows,
            vec![
                vec![
                    Value::from("/World/Mesh"),
                    Value::from("lights"),
                    Value::from("/World/Key"),
                    Value::Integer(0),
                ],
                vec![
                    Value::from("/World/Mesh"),
                    Value::from("lights"),
                    Value::from("/World/Fill"),
                    Value::Integer(1),
                ],
                vec![
                    Value::from("/World/Mesh"),
                    Value::from("material:binding"),
                    Value::from("/Looks/Red"),
                    Value::Integer(0),
                ],
            ]
        );
    }
}
