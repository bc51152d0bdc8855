//! usdsql extension - USD scene description as relational tables.
//!
//! Registers five table functions with a [`host::FunctionRegistry`]:
//!
//! - `usd_prims(path)` - `(path, type_name)`, one row per prim
//! - `usd_prim_metadata(path)` - hierarchy, kind, active and instanceable
//! - `usd_properties(path)` - attributes and relationships per prim
//! - `usd_relationships(path)` - one row per relationship target
//! - `usd_xforms(path)` - world-space translation of xformable prims
//!
//! # Example
//!
//! ```ignore
//! use usdsql_ext::host::{FunctionRegistry, ScanRequest, Value};
//! use usdsql_ext::UsdExtension;
//!
//! let mut registry = FunctionRegistry::new();
//! UsdExtension::load(&mut registry);
//!
//! let result = registry.run("usd_prims", &[Value::from("scene.usda")], ScanRequest::default())?;
//! for row in &result.rows {
//!     println!("{} {}", row[0], row[1]);
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod functions;
pub mod host;
pub mod projector;

use std::sync::Arc;

pub use config::UsdConfig;
pub use error::{ErrorKind, FunctionError, FunctionResult};

use adapter::PrimTableFunction;
use functions::*;
use host::FunctionRegistry;

/// Extension entry point.
pub struct UsdExtension;

impl UsdExtension {
    pub fn name() -> &'static str {
        "usd"
    }

    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Register all USD table functions with the default configuration.
    pub fn load(registry: &mut FunctionRegistry) {
        Self::with_config(registry, UsdConfig::default());
    }

    /// Register all USD table functions sharing `config`.
    pub fn with_config(registry: &mut FunctionRegistry, config: UsdConfig) {
        let config = Arc::new(config);

        registry.register(PrimTableFunction::<PrimsProjector>::new(Arc::clone(&config)));
        registry.register(PrimTableFunction::<PrimMetadataProjector>::new(Arc::clone(&config)));
        registry.register(PrimTableFunction::<PropertiesProjector>::new(Arc::clone(&config)));
        registry.register(PrimTableFunction::<RelationshipsProjector>::new(Arc::clone(&config)));
        registry.register(PrimTableFunction::<XformsProjector>::new(config));

        log::info!("Loaded {} extension v{}", Self::name(), Self::version());
    }
}
