//! Composed stage and the typed prim handle.
//!
//! A [`Stage`] owns every prim spec of the layer in an arena. [`Prim`] is a
//! cheap, copyable view into that arena with a fixed capability surface:
//! name, type, metadata, ordered children and properties.

use std::fmt;

use glam::DMat4;

use super::parser::ParsedLayer;
use super::types::*;

/// Prim types that carry xformOps.
pub const XFORMABLE_TYPES: &[&str] = &[
    "Xform",
    "Mesh",
    "Cube",
    "Sphere",
    "Cylinder",
    "Cone",
    "Capsule",
    "Plane",
    "Points",
    "BasisCurves",
    "NurbsCurves",
    "NurbsPatch",
    "PointInstancer",
    "Camera",
    "SkelRoot",
    "Skeleton",
    "DistantLight",
    "DomeLight",
    "SphereLight",
    "RectLight",
    "DiskLight",
    "CylinderLight",
];

/// A composed scene-description stage.
#[derive(Clone, Debug, Default)]
pub struct Stage {
    metadata: LayerMetadata,
    prims: Vec<PrimSpec>,
    roots: Vec<PrimId>,
}

impl Stage {
    /// Build a stage from a parsed layer.
    pub fn from_layer(layer: ParsedLayer) -> Self {
        Self {
            metadata: layer.metadata,
            prims: layer.prims,
            roots: layer.roots,
        }
    }

    /// Layer metadata (default prim, up axis, ...).
    pub fn metadata(&self) -> &LayerMetadata {
        &self.metadata
    }

    /// Total number of prim specs, whatever their specifier.
    pub fn prim_count(&self) -> usize {
        self.prims.len()
    }

    /// Get a prim by id.
    pub fn prim(&self, id: PrimId) -> Option<Prim<'_>> {
        (id.0 < self.prims.len()).then_some(Prim { stage: self, id })
    }

    /// Root prims (children of the pseudo-root) in declared order.
    pub fn root_prims(&self) -> impl Iterator<Item = Prim<'_>> + '_ {
        self.roots.iter().map(move |&id| Prim { stage: self, id })
    }

    /// The prim named by the `defaultPrim` layer metadata, if it exists.
    pub fn default_prim(&self) -> Option<Prim<'_>> {
        let name = self.metadata.default_prim.as_deref()?;
        self.root_prims().find(|p| p.name() == name)
    }

    /// Look up a prim by absolute path (`/World/Cube`).
    pub fn prim_at_path(&self, path: &str) -> Option<Prim<'_>> {
        let mut segments = path.strip_prefix('/')?.split('/');
        let first = segments.next().filter(|s| !s.is_empty())?;

        let mut current = self.root_prims().find(|p| p.name() == first)?;
        for segment in segments {
            current = current.children().find(|p| p.name() == segment)?;
        }
        Some(current)
    }

    /// Child ids of `parent`, or the root prims for the pseudo-root.
    pub(crate) fn child_ids(&self, parent: Option<PrimId>) -> &[PrimId] {
        match parent {
            Some(id) => self.prims.get(id.0).map(|p| p.children.as_slice()).unwrap_or(&[]),
            None => &self.roots,
        }
    }

    pub(crate) fn spec(&self, id: PrimId) -> &PrimSpec {
        &self.prims[id.0]
    }
}

/// A view of one prim inside a [`Stage`].
#[derive(Clone, Copy)]
pub struct Prim<'a> {
    stage: &'a Stage,
    id: PrimId,
}

impl<'a> Prim<'a> {
    pub(crate) fn new(stage: &'a Stage, id: PrimId) -> Self {
        Self { stage, id }
    }

    fn spec(&self) -> &'a PrimSpec {
        self.stage.spec(self.id)
    }

    /// Arena id of this prim.
    pub fn id(&self) -> PrimId {
        self.id
    }

    /// Local name (last path element).
    pub fn name(&self) -> &'a str {
        &self.spec().name
    }

    /// Declared type name, empty when untyped.
    pub fn type_name(&self) -> &'a str {
        &self.spec().type_name
    }

    pub fn specifier(&self) -> Specifier {
        self.spec().specifier
    }

    /// `kind` metadata, if authored.
    pub fn kind(&self) -> Option<&'a str> {
        self.spec().kind.as_deref()
    }

    /// Prims are active unless `active = false` is authored.
    pub fn is_active(&self) -> bool {
        self.spec().active.unwrap_or(true)
    }

    pub fn is_instanceable(&self) -> bool {
        self.spec().instanceable.unwrap_or(false)
    }

    /// Whether the prim has a defining specifier (`def` or `class`).
    pub fn is_defined(&self) -> bool {
        self.specifier() != Specifier::Over
    }

    /// Whether the prim is a `class`.
    pub fn is_abstract(&self) -> bool {
        self.specifier() == Specifier::Class
    }

    /// Whether the prim type carries xformOps.
    pub fn is_xformable(&self) -> bool {
        XFORMABLE_TYPES.contains(&self.type_name())
    }

    pub fn parent(&self) -> Option<Prim<'a>> {
        self.spec().parent.map(|id| Prim::new(self.stage, id))
    }

    /// Children in declared order.
    pub fn children(&self) -> impl Iterator<Item = Prim<'a>> + 'a {
        let stage = self.stage;
        self.spec().children.iter().map(move |&id| Prim::new(stage, id))
    }

    pub fn child_count(&self) -> usize {
        self.spec().children.len()
    }

    /// Properties in authored order.
    pub fn properties(&self) -> &'a [PropertySpec] {
        &self.spec().properties
    }

    pub fn attribute(&self, name: &str) -> Option<&'a AttributeSpec> {
        self.properties()
            .iter()
            .find(|p| p.name == name)
            .and_then(PropertySpec::as_attribute)
    }

    pub fn relationship(&self, name: &str) -> Option<&'a RelationshipSpec> {
        self.properties()
            .iter()
            .find(|p| p.name == name)
            .and_then(PropertySpec::as_relationship)
    }

    /// Absolute path, rebuilt from the parent chain.
    ///
    /// Traversals should use the path tracked by the walker instead.
    pub fn path(&self) -> String {
        let mut names = vec![self.name()];
        let mut current = self.parent();
        while let Some(prim) = current {
            names.push(prim.name());
            current = prim.parent();
        }

        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        path
    }

    /// Local transform composed from the authored xformOps.
    ///
    /// Only ops named in `xformOpOrder` contribute; without an authored order
    /// the local transform is identity, even if `xformOp:*` attributes exist.
    /// The flag is true when the order starts with `!resetXformStack!`,
    /// meaning the parent transform is ignored.
    pub fn local_transform(&self) -> (DMat4, bool) {
        let Some(order) = self
            .attribute("xformOpOrder")
            .and_then(|attr| attr.default.as_ref())
        else {
            return (DMat4::IDENTITY, false);
        };
        let order: Vec<&str> = match order {
            UsdValue::Array(items) => items.iter().filter_map(|item| item.as_str()).collect(),
            _ => Vec::new(),
        };

        let mut ops = Vec::new();
        let mut resets = false;

        for entry in order {
            if entry == "!resetXformStack!" {
                resets = true;
                ops.clear();
                continue;
            }
            let (name, invert) = match entry.strip_prefix("!invert!") {
                Some(name) => (name, true),
                None => (entry, false),
            };
            let op = self
                .attribute(name)
                .and_then(|attr| attr.default.as_ref())
                .and_then(|value| XformOp::from_attribute(name, value));
            match op {
                Some(op) if invert => ops.push(XformOp::Transform(op.to_matrix().inverse())),
                Some(op) => ops.push(op),
                None => log::warn!("{}: unresolved xformOp '{}'", self.path(), entry),
            }
        }

        (compose_xform_ops(&ops), resets)
    }
}

/// Resolve a target path against the path of the prim that authored it.
///
/// Absolute targets are returned unchanged. `.` and `..` segments are
/// applied to `anchor`; `..` never climbs above the pseudo-root.
pub fn make_absolute_path(target: &str, anchor: &str) -> String {
    if target.starts_with('/') {
        return target.to_string();
    }

    let mut segments: Vec<&str> = anchor.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }
    let mut path = String::new();
    for segment in segments {
        path.push('/');
        path.push_str(segment);
    }
    path
}

impl fmt::Debug for Prim<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prim")
            .field("path", &self.path())
            .field("type_name", &self.type_name())
            .finish()
    }
}
