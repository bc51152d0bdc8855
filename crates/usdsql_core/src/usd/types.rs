//! USD spec types for the parsed, composed layer.
//!
//! These types hold what the USDA parser extracted for each prim before it is
//! exposed through the [`Stage`](super::Stage) and [`Prim`](super::Prim) handles.

use std::fmt;

use glam::{DMat4, DQuat, DVec3};

/// Index of a prim inside a [`Stage`](super::Stage) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimId(pub(crate) usize);

impl PrimId {
    /// Position of the prim in the stage arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// How a prim spec was introduced in the layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Specifier {
    /// `def` - a concrete, defined prim
    #[default]
    Def,

    /// `over` - an override that does not define the prim by itself
    Over,

    /// `class` - an abstract prim
    Class,
}

impl Specifier {
    /// Parse a specifier keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "def" => Some(Specifier::Def),
            "over" => Some(Specifier::Over),
            "class" => Some(Specifier::Class),
            _ => None,
        }
    }

    /// Keyword as written in USDA.
    pub fn as_str(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }
}

/// An authored value, kept close to its USDA literal form.
#[derive(Clone, Debug, PartialEq)]
pub enum UsdValue {
    /// Number, token-like word, `true`/`false` or `None`
    Atom(String),

    /// Quoted string
    String(String),

    /// Path reference `</Some/Path>`
    Path(String),

    /// Asset path `@file.usda@`
    Asset(String),

    /// Parenthesised tuple `(1, 2, 3)`
    Tuple(Vec<UsdValue>),

    /// Bracketed array `[1, 2, 3]`
    Array(Vec<UsdValue>),

    /// Dictionary or other braced block, kept verbatim
    Block(String),
}

impl UsdValue {
    /// Interpret the value as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            UsdValue::Atom(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Interpret the value as a boolean (`true`/`false`/`1`/`0`).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            UsdValue::Atom(s) => match s.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Interpret the value as string-like text (quoted strings and tokens).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            UsdValue::String(s) | UsdValue::Atom(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a 3-component vector.
    pub fn as_dvec3(&self) -> Option<DVec3> {
        match self {
            UsdValue::Tuple(items) if items.len() == 3 => Some(DVec3::new(
                items[0].as_f64()?,
                items[1].as_f64()?,
                items[2].as_f64()?,
            )),
            _ => None,
        }
    }

    /// Interpret the value as a 4x4 matrix written row by row.
    pub fn as_dmat4(&self) -> Option<DMat4> {
        let UsdValue::Tuple(rows) = self else {
            return None;
        };
        if rows.len() != 4 {
            return None;
        }

        let mut cols = [0.0f64; 16];
        for (r, row) in rows.iter().enumerate() {
            let UsdValue::Tuple(items) = row else {
                return None;
            };
            if items.len() != 4 {
                return None;
            }
            for (c, item) in items.iter().enumerate() {
                cols[r * 4 + c] = item.as_f64()?;
            }
        }

        // USD stores row vectors; glam is column major, so the row-major
        // array is already the transposed layout glam expects.
        Some(DMat4::from_cols_array(&cols))
    }

    /// Interpret the value as a list of path targets.
    pub fn paths(&self) -> Vec<String> {
        match self {
            UsdValue::Path(p) => vec![p.clone()],
            UsdValue::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    UsdValue::Path(p) => Some(p.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for UsdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsdValue::Atom(s) | UsdValue::String(s) => write!(f, "{}", s),
            UsdValue::Path(p) => write!(f, "<{}>", p),
            UsdValue::Asset(a) => write!(f, "@{}@", a),
            UsdValue::Tuple(items) => write_list(f, "(", items, ")"),
            UsdValue::Array(items) => write_list(f, "[", items, "]"),
            UsdValue::Block(raw) => write!(f, "{{{}}}", raw),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, open: &str, items: &[UsdValue], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

/// Attribute variability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Variability {
    #[default]
    Varying,
    Uniform,
}

/// An attribute spec.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeSpec {
    /// Value type name as authored (e.g. `float3[]`, `token`)
    pub type_name: String,

    /// Declared with `custom`
    pub custom: bool,

    /// `uniform` or varying
    pub variability: Variability,

    /// Default (non time-sampled) value
    pub default: Option<UsdValue>,

    /// Number of authored time samples
    pub time_sample_count: usize,

    /// `.connect` targets
    pub connections: Vec<String>,
}

impl AttributeSpec {
    /// Whether the value type is an array type.
    pub fn is_array(&self) -> bool {
        self.type_name.ends_with("[]")
    }

    /// Whether the value may vary over time (more than one sample).
    pub fn might_be_time_varying(&self) -> bool {
        self.time_sample_count > 1
    }
}

/// A relationship spec.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationshipSpec {
    /// Declared with `custom`
    pub custom: bool,

    /// Target paths in authored order (possibly relative)
    pub targets: Vec<String>,
}

/// Attribute or relationship payload of a property.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyKind {
    Attribute(AttributeSpec),
    Relationship(RelationshipSpec),
}

/// A named property on a prim.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertySpec {
    /// Property name including namespaces (e.g. `xformOp:translate`)
    pub name: String,

    /// Attribute or relationship data
    pub kind: PropertyKind,
}

impl PropertySpec {
    /// Returns the attribute data if this is an attribute.
    pub fn as_attribute(&self) -> Option<&AttributeSpec> {
        match &self.kind {
            PropertyKind::Attribute(attr) => Some(attr),
            PropertyKind::Relationship(_) => None,
        }
    }

    /// Returns the relationship data if this is a relationship.
    pub fn as_relationship(&self) -> Option<&RelationshipSpec> {
        match &self.kind {
            PropertyKind::Relationship(rel) => Some(rel),
            PropertyKind::Attribute(_) => None,
        }
    }
}

/// A prim spec stored in the stage arena.
#[derive(Clone, Debug, Default)]
pub struct PrimSpec {
    /// Local name (last path element)
    pub name: String,

    /// Declared type, empty when untyped
    pub type_name: String,

    /// `def`, `over` or `class`
    pub specifier: Specifier,

    /// Parent prim, `None` for root prims
    pub parent: Option<PrimId>,

    /// Children in declared order
    pub children: Vec<PrimId>,

    /// `kind` metadata
    pub kind: Option<String>,

    /// `active` metadata
    pub active: Option<bool>,

    /// `instanceable` metadata
    pub instanceable: Option<bool>,

    /// Properties in authored order
    pub properties: Vec<PropertySpec>,
}

/// Layer-level metadata from the header block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerMetadata {
    /// `defaultPrim`
    pub default_prim: Option<String>,

    /// `upAxis`
    pub up_axis: Option<String>,

    /// `metersPerUnit`
    pub meters_per_unit: Option<f64>,

    /// `doc` string
    pub doc: Option<String>,
}

/// Transform operation types found in USD xformOps.
#[derive(Clone, Debug, PartialEq)]
pub enum XformOp {
    /// Translation (xformOp:translate)
    Translate(DVec3),

    /// Rotation in degrees around X axis
    RotateX(f64),

    /// Rotation in degrees around Y axis
    RotateY(f64),

    /// Rotation in degrees around Z axis
    RotateZ(f64),

    /// Euler rotation XYZ in degrees
    RotateXYZ(DVec3),

    /// Orientation quaternion (xformOp:orient)
    Orient(DQuat),

    /// Scale (uniform or non-uniform)
    Scale(DVec3),

    /// Full 4x4 transform matrix
    Transform(DMat4),
}

impl XformOp {
    /// Build an op from its attribute name and authored value.
    ///
    /// `name` may carry a suffix (`xformOp:translate:pivot`); only the op type
    /// matters here. Returns `None` for unsupported ops or malformed values.
    pub fn from_attribute(name: &str, value: &UsdValue) -> Option<Self> {
        let op = name.strip_prefix("xformOp:")?;
        let op = op.split(':').next().unwrap_or(op);

        match op {
            "translate" => value.as_dvec3().map(XformOp::Translate),
            "rotateX" => value.as_f64().map(XformOp::RotateX),
            "rotateY" => value.as_f64().map(XformOp::RotateY),
            "rotateZ" => value.as_f64().map(XformOp::RotateZ),
            "rotateXYZ" => value.as_dvec3().map(XformOp::RotateXYZ),
            "scale" => value.as_dvec3().map(XformOp::Scale),
            "transform" => value.as_dmat4().map(XformOp::Transform),
            "orient" => match value {
                // USD writes quaternions real part first: (w, x, y, z)
                UsdValue::Tuple(items) if items.len() == 4 => Some(XformOp::Orient(
                    DQuat::from_xyzw(
                        items[1].as_f64()?,
                        items[2].as_f64()?,
                        items[3].as_f64()?,
                        items[0].as_f64()?,
                    )
                    .normalize(),
                )),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert this operation to a transformation matrix.
    pub fn to_matrix(&self) -> DMat4 {
        match self {
            XformOp::Translate(t) => DMat4::from_translation(*t),
            XformOp::RotateX(deg) => DMat4::from_rotation_x(deg.to_radians()),
            XformOp::RotateY(deg) => DMat4::from_rotation_y(deg.to_radians()),
            XformOp::RotateZ(deg) => DMat4::from_rotation_z(deg.to_radians()),
            // X is applied first
            XformOp::RotateXYZ(euler) => {
                DMat4::from_rotation_z(euler.z.to_radians())
                    * DMat4::from_rotation_y(euler.y.to_radians())
                    * DMat4::from_rotation_x(euler.x.to_radians())
            }
            XformOp::Orient(q) => DMat4::from_quat(*q),
            XformOp::Scale(s) => DMat4::from_scale(*s),
            XformOp::Transform(m) => *m,
        }
    }
}

/// Combine a list of xformOps into a single matrix.
pub fn compose_xform_ops(ops: &[XformOp]) -> DMat4 {
    let mut result = DMat4::IDENTITY;
    for op in ops {
        result = result * op.to_matrix();
    }
    result
}
