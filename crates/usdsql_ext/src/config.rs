//! Extension configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use usdsql_core::usd::{ReaderOptions, WalkOptions};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid USD extension config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings shared by every USD table function.
///
/// ```ignore
/// let config = UsdConfig::from_json(r#"{ "traversal": { "include_inactive": false } }"#)?;
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsdConfig {
    /// Reject paths without a `.usd`, `.usda`, `.usdc` or `.usdz` extension
    pub require_usd_extension: bool,

    /// Which prims the table functions report
    pub traversal: WalkOptions,
}

impl Default for UsdConfig {
    fn default() -> Self {
        Self {
            require_usd_extension: true,
            traversal: WalkOptions::default(),
        }
    }
}

impl UsdConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            require_usd_extension: self.require_usd_extension,
        }
    }
}
