//! USD (Universal Scene Description) reading for usdsql.
//!
//! This module opens USDA (ASCII) layers, builds an immutable prim arena
//! and walks it lazily in pre-order.
//!
//! ## Supported
//!
//! - `def`, `over` and `class` prims with `kind`, `active` and
//!   `instanceable` metadata
//! - Attributes (defaults, time-sample counts, connections) and
//!   relationships
//! - xformOps composed in `xformOpOrder`
//!
//! ## Not Supported
//!
//! - Binary `.usdc` layers and `.usdz` packages (detected and rejected)
//! - Composition arcs: references, payloads, inherits, variants
//!
//! # Example
//!
//! ```ignore
//! use usdsql_core::usd::{Asset, ReaderOptions, WalkOptions};
//!
//! let asset = Asset::open("scene.usda", &ReaderOptions::default())?;
//! for prim in asset.traverse(&WalkOptions::default())? {
//!     let prim = prim?;
//!     println!("{} {}", prim.path(), prim.prim().type_name());
//! }
//! ```

mod types;
mod parser;
mod stage;
mod reader;
mod walker;

pub use types::*;
pub use parser::*;
pub use stage::*;
pub use reader::*;
pub use walker::*;
