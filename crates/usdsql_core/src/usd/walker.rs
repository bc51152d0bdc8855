//! Lazy pre-order prim traversal.
//!
//! The walker keeps a stack of sibling cursors and a single path buffer.
//! Each step advances the top cursor, truncates the buffer to the parent's
//! length and appends `/name`, so only the work needed to reach the next
//! prim is ever done.

use std::iter::FusedIterator;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stage::{Prim, Stage};
use super::types::PrimId;

/// Errors raised while stepping a walk.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalkError {
    #[error("Stale stage handle: the asset was closed during traversal")]
    StaleHandle,
}

/// Which prims a walk admits.
///
/// A prim that is not admitted is skipped together with its whole subtree.
///
/// The default reports inactive prims (`include_inactive: true`). This
/// differs from USD's default traversal, which prunes inactive prims and
/// their descendants; set `include_inactive: false` to match it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkOptions {
    /// Report prims authored with `active = false`
    pub include_inactive: bool,

    /// Report `class` prims
    pub include_abstract: bool,

    /// Report prims that only have `over` opinions
    pub include_undefined: bool,

    /// Root the walk at the layer's default prim when it exists
    pub from_default_prim: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            include_inactive: true,
            include_abstract: false,
            include_undefined: false,
            from_default_prim: false,
        }
    }
}

impl WalkOptions {
    pub fn admits(&self, prim: &Prim<'_>) -> bool {
        (self.include_inactive || prim.is_active())
            && (self.include_abstract || !prim.is_abstract())
            && (self.include_undefined || prim.is_defined())
    }
}

/// A prim reached by the walker, with its absolute path and depth.
#[derive(Clone, Debug)]
pub struct WalkedPrim {
    stage: Arc<Stage>,
    id: PrimId,
    path: String,
    depth: usize,
}

impl WalkedPrim {
    pub fn prim(&self) -> Prim<'_> {
        Prim::new(&self.stage, self.id)
    }

    pub fn id(&self) -> PrimId {
        self.id
    }

    /// Absolute path, e.g. `/World/Cube`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Depth below the walk root; root-level prims are at depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn stage(&self) -> &Arc<Stage> {
        &self.stage
    }
}

#[derive(Clone, Copy, Debug)]
enum Siblings {
    /// Children of a prim, or the root prims for `None`
    Children(Option<PrimId>),
    /// A single prim (the default prim)
    Single(PrimId),
}

#[derive(Debug)]
struct Cursor {
    siblings: Siblings,
    next: usize,
    path_len: usize,
    depth: usize,
}

/// Pre-order depth-first iterator over a stage.
///
/// Holds only a weak reference to the stage; once the owning asset is
/// closed the next step yields [`WalkError::StaleHandle`] and the walker
/// is exhausted.
#[derive(Debug)]
pub struct PrimWalker {
    stage: Weak<Stage>,
    options: WalkOptions,
    stack: Vec<Cursor>,
    path: String,
    visited: usize,
    done: bool,
}

impl PrimWalker {
    pub(crate) fn new(stage: &Arc<Stage>, options: &WalkOptions) -> Self {
        let root = if options.from_default_prim {
            match stage.default_prim() {
                Some(prim) => Siblings::Single(prim.id()),
                None => {
                    log::warn!("No default prim, walking from the pseudo-root");
                    Siblings::Children(None)
                }
            }
        } else {
            Siblings::Children(None)
        };

        Self {
            stage: Arc::downgrade(stage),
            options: options.clone(),
            stack: vec![Cursor {
                siblings: root,
                next: 0,
                path_len: 0,
                depth: 0,
            }],
            path: String::with_capacity(128),
            visited: 0,
            done: false,
        }
    }

    /// Number of prims emitted so far.
    pub fn visited(&self) -> usize {
        self.visited
    }

    fn step(&mut self, stage: &Arc<Stage>) -> Option<WalkedPrim> {
        loop {
            let cursor = self.stack.last_mut()?;

            let next = match cursor.siblings {
                Siblings::Children(parent) => stage.child_ids(parent).get(cursor.next).copied(),
                Siblings::Single(id) => (cursor.next == 0).then_some(id),
            };
            let Some(id) = next else {
                self.stack.pop();
                continue;
            };
            cursor.next += 1;

            let (path_len, depth) = (cursor.path_len, cursor.depth);
            let prim = Prim::new(stage, id);
            if !self.options.admits(&prim) {
                continue;
            }

            self.path.truncate(path_len);
            self.path.push('/');
            self.path.push_str(prim.name());

            self.stack.push(Cursor {
                siblings: Siblings::Children(Some(id)),
                next: 0,
                path_len: self.path.len(),
                depth: depth + 1,
            });
            self.visited += 1;

            return Some(WalkedPrim {
                stage: Arc::clone(stage),
                id,
                path: self.path.clone(),
                depth,
            });
        }
    }
}

impl Iterator for PrimWalker {
    type Item = Result<WalkedPrim, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let Some(stage) = self.stage.upgrade() else {
            self.done = true;
            self.stack.clear();
            return Some(Err(WalkError::StaleHandle));
        };

        match self.step(&stage) {
            Some(prim) => Some(Ok(prim)),
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl FusedIterator for PrimWalker {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usd::Asset;

    const SCENE: &str = r#"#usda 1.0
(
    defaultPrim = "World"
)

def Xform "World"
{
    def Cube "Cube" {}
    def Sphere "Sphere" {}
    def Xform "Group"
    {
        def Mesh "Mesh" {}
    }
}
"#;

    fn walk(asset: &Asset, options: &WalkOptions) -> Vec<(String, usize)> {
        asset
            .traverse(options)
            .unwrap()
            .map(|p| {
                let p = p.unwrap();
                (p.path().to_string(), p.depth())
            })
            .collect()
    }

    #[test]
    fn test_preorder_paths_and_depths() {
        let asset = Asset::from_string("scene", SCENE).unwrap();
        let walked = walk(&asset, &WalkOptions::default());
        assert_eq!(
            walked,
            vec![
                ("/World".to_string(), 0),
                ("/World/Cube".to_string(), 1),
                ("/World/Sphere".to_string(), 1),
                ("/World/Group".to_string(), 1),
                ("/World/Group/Mesh".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_empty_stage() {
        let asset = Asset::from_string("empty", "#usda 1.0\n").unwrap();
        let mut walker = asset.traverse(&WalkOptions::default()).unwrap();
        assert!(walker.next().is_none());
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_pruning() {
        let asset = Asset::from_string(
            "pruning",
            r#"#usda 1.0
def "A" (active = false)
{
    def "A1" {}
}
class "Proto"
{
    def "Inner" {}
}
over "Patch"
{
    def "Child" {}
}
def "B" {}
"#,
        )
        .unwrap();

        let paths: Vec<String> = walk(&asset, &WalkOptions::default())
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(paths, vec!["/A", "/A/A1", "/B"]);

        let active_only = WalkOptions {
            include_inactive: false,
            ..Default::default()
        };
        let paths: Vec<String> = walk(&asset, &active_only).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["/B"]);

        let everything = WalkOptions {
            include_abstract: true,
            include_undefined: true,
            ..Default::default()
        };
        assert_eq!(walk(&asset, &everything).len(), 7);
    }

    #[test]
    fn test_from_default_prim() {
        let asset = Asset::from_string(
            "default",
            "#usda 1.0\n(\n    defaultPrim = \"B\"\n)\ndef \"A\" {}\ndef \"B\" {\n    def \"C\" {}\n}\n",
        )
        .unwrap();
        let options = WalkOptions {
            from_default_prim: true,
            ..Default::default()
        };
        let walked = walk(&asset, &options);
        assert_eq!(walked, vec![("/B".to_string(), 0), ("/B/C".to_string(), 1)]);
    }

    #[test]
    fn test_stale_after_close() {
        let mut asset = Asset::from_string("scene", SCENE).unwrap();
        let mut walker = asset.traverse(&WalkOptions::default()).unwrap();

        let first = walker.next().unwrap().unwrap();
        assert_eq!(first.path(), "/World");
        drop(first);

        asset.close();
        assert_eq!(walker.next().unwrap().unwrap_err(), WalkError::StaleHandle);
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_lazy_visit_count() {
        let asset = Asset::from_string("scene", SCENE).unwrap();
        let mut walker = asset.traverse(&WalkOptions::default()).unwrap();
        walker.next();
        walker.next();
        assert_eq!(walker.visited(), 2);
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let options: WalkOptions = serde_json::from_str(r#"{"include_abstract": true}"#).unwrap();
        assert!(options.include_inactive);
        assert!(options.include_abstract);
        assert!(!options.from_default_prim);
    }
}
