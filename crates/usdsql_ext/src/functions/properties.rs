use usdsql_core::usd::{PropertyKind, WalkedPrim};

use crate::host::{ColumnDef, Row};
use crate::projector::PrimProjector;

/// `usd_properties(path)`: one row per attribute or relationship.
///
/// Properties are listed in name order within each prim.
#[derive(Default)]
pub struct PropertiesProjector;

impl PrimProjector for PropertiesProjector {
    const NAME: &'static str = "usd_properties";

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::varchar("prim_path"),
            ColumnDef::varchar("prop_name"),
            ColumnDef::varchar("prop_kind"),
            ColumnDef::varchar("usd_type_name"),
            ColumnDef::boolean("is_array"),
            ColumnDef::boolean("is_time_sampled"),
            ColumnDef::varchar("default_value"),
        ]
    }

    fn project(&mut self, walked: &WalkedPrim, out: &mut Vec<Row>) {
        let mut properties: Vec<_> = walked.prim().properties().iter().collect();
        properties.sort_by(|a, b| a.name.cmp(&b.name));

        for property in properties {
            let row = match &property.kind {
                PropertyKind::Attribute(attr) => vec![
                    walked.path().into(),
                    property.name.as_str().into(),
                    "attribute".into(),
                    attr.type_name.as_str().into(),
                    attr.is_array().into(),
                    attr.might_be_time_varying().into(),
                    attr.default
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default()
                        .into(),
                ],
                PropertyKind::Relationship(_) => vec![
                    walked.path().into(),
                    property.name.as_str().into(),
                    "relationship".into(),
                    "relationship".into(),
                    false.into(),
                    false.into(),
                    "".into(),
                ],
            };
            out.push(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_util::project_all;
    use crate::host::Value;

    const MESH: &str = r#"#usda 1.0
def Mesh "Mesh"
{
    point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
    double radius.timeSamples = {
        1: 1.0,
        2: 2.0,
    }
    rel material:binding = </Looks/Red>
    float size = 2
}
"#;

    #[test]
    fn test_properties_sorted_by_name() {
        let rows = project_all::<PropertiesProjector>(MESH);
        let names: Vec<String> = rows.iter().map(|row| row[1].to_string()).collect();
        assert_eq!(names, vec!["material:binding", "points", "radius", "size"]);
    }

    #[test]
    fn test_property_columns() {
        let rows = project_all::<PropertiesProjector>(MESH);

        let binding = &rows[0];
        assert_eq!(binding[2], Value::from("relationship"));
        assert_eq!(binding[3], Value::from("relationship"));
        assert_eq!(binding[6], Value::from(""));

        let points = &rows[1];
        assert_eq!(points[3], Value::from("point3f[]"));
        assert_eq!(points[4], Value::Boolean(true));
        assert_eq!(points[5], Value::Boolean(false));

        let radius = &rows[2];
        assert_eq!(radius[5], Value::Boolean(true));
        assert_eq!(radius[6], Value::from(""));

        let size = &rows[3];
        assert_eq!(size[0], Value::from("/Mesh"));
        assert_eq!(size[6], Value::from("2"));
    }
}
