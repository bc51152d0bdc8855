//! usdsql core - USD asset reading and prim traversal.
//!
//! This crate provides:
//!
//! - **Asset reader**: `Asset` opens a USDA layer and owns its `Stage`
//! - **Prim model**: `Stage` arena and the typed `Prim` handle
//! - **Traversal**: `PrimWalker`, a lazy pre-order walk with absolute paths
//!
//! Unlike USD's default traversal, `WalkOptions::default()` includes
//! inactive prims.
//!
//! # Example
//!
//! ```ignore
//! use usdsql_core::{Asset, ReaderOptions, WalkOptions};
//!
//! let asset = Asset::open("scene.usda", &ReaderOptions::default())?;
//! let count = asset.traverse(&WalkOptions::default())?.count();
//! println!("{} prims", count);
//! ```

pub mod usd;

// Re-export commonly used types
pub use usd::{
    Asset, Prim, PrimWalker, ReadError, ReaderOptions, Stage, WalkError, WalkOptions, WalkedPrim,
};
