//! Asset reader: opens a scene-description file and owns its stage.
//!
//! The file is read and parsed once in [`Asset::open`]; no file handle is
//! kept afterwards. The composed [`Stage`] lives behind an `Arc` that only
//! the asset holds strongly, so closing (or dropping) the asset invalidates
//! every walker created from it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::parser::{parse_usda, ParseError};
use super::stage::Stage;
use super::walker::{PrimWalker, WalkError, WalkOptions};

/// File extensions accepted when the extension check is enabled.
pub const USD_EXTENSIONS: &[&str] = &["usd", "usda", "usdc", "usdz"];

const USDC_MAGIC: &[u8] = b"PXR-USDC";
const USDZ_MAGIC: &[u8] = b"PK\x03\x04";
const USDA_HEADER: &str = "#usda";

/// Errors that can occur while opening an asset.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("USD file not found: {0}")]
    NotFound(String),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("Unsupported format for {path}: {reason}")]
    UnsupportedFormat { path: String, reason: String },
}

/// Result type for reader operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// Options controlling how assets are opened.
#[derive(Clone, Debug)]
pub struct ReaderOptions {
    /// Reject paths whose extension is not one of [`USD_EXTENSIONS`]
    pub require_usd_extension: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            require_usd_extension: true,
        }
    }
}

/// An opened scene-description asset.
#[derive(Debug)]
pub struct Asset {
    path: PathBuf,
    stage: Option<Arc<Stage>>,
}

impl Asset {
    /// Open and parse the asset at `path`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use usdsql_core::usd::{Asset, ReaderOptions, WalkOptions};
    ///
    /// let asset = Asset::open("scene.usda", &ReaderOptions::default())?;
    /// for prim in asset.traverse(&WalkOptions::default())? {
    ///     let prim = prim?;
    ///     println!("{} {}", prim.path(), prim.prim().type_name());
    /// }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, options: &ReaderOptions) -> ReadResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();

        // Existence and readability come before any format checks
        if !path.is_file() {
            return Err(ReadError::NotFound(display));
        }

        if options.require_usd_extension {
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase);
            let accepted = extension
                .as_deref()
                .map(|ext| USD_EXTENSIONS.contains(&ext))
                .unwrap_or(false);
            if !accepted {
                return Err(ReadError::UnsupportedFormat {
                    path: display,
                    reason: format!(
                        "expected one of .{}",
                        USD_EXTENSIONS.join(", .")
                    ),
                });
            }
        }

        let bytes = fs::read(path).map_err(|err| {
            log::debug!("Failed to read {}: {}", display, err);
            ReadError::NotFound(display.clone())
        })?;

        let stage = parse_bytes(&display, &bytes)?;
        log::info!("Opened {} ({} prims)", display, stage.prim_count());

        Ok(Self {
            path: path.to_path_buf(),
            stage: Some(Arc::new(stage)),
        })
    }

    /// Parse an in-memory USDA layer. `name` is used in diagnostics.
    pub fn from_string(name: &str, content: &str) -> ReadResult<Self> {
        let stage = parse_text(name, content)?;
        log::debug!("Parsed {} from memory ({} prims)", name, stage.prim_count());

        Ok(Self {
            path: PathBuf::from(name),
            stage: Some(Arc::new(stage)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.stage.is_some()
    }

    /// The composed stage, or `None` once closed.
    pub fn stage(&self) -> Option<&Arc<Stage>> {
        self.stage.as_ref()
    }

    /// Start a lazy pre-order walk over the stage.
    pub fn traverse(&self, options: &WalkOptions) -> Result<PrimWalker, WalkError> {
        let stage = self.stage.as_ref().ok_or(WalkError::StaleHandle)?;
        Ok(PrimWalker::new(stage, options))
    }

    /// Release the stage. Walkers created from this asset become stale.
    pub fn close(&mut self) {
        if self.stage.take().is_some() {
            log::debug!("Released {}", self.path.display());
        }
    }
}

impl Drop for Asset {
    fn drop(&mut self) {
        self.close();
    }
}

fn parse_bytes(path: &str, bytes: &[u8]) -> ReadResult<Stage> {
    if bytes.starts_with(USDC_MAGIC) {
        return Err(ReadError::UnsupportedFormat {
            path: path.to_string(),
            reason: "binary crate (usdc) layers are not supported".to_string(),
        });
    }
    if bytes.starts_with(USDZ_MAGIC) {
        return Err(ReadError::UnsupportedFormat {
            path: path.to_string(),
            reason: "usdz packages are not supported".to_string(),
        });
    }

    let content = std::str::from_utf8(bytes).map_err(|err| ReadError::Parse {
        path: path.to_string(),
        source: ParseError::Parse {
            line: 1,
            message: format!("invalid UTF-8: {}", err),
        },
    })?;

    parse_text(path, content)
}

fn parse_text(path: &str, content: &str) -> ReadResult<Stage> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if !content.starts_with(USDA_HEADER) {
        return Err(ReadError::Parse {
            path: path.to_string(),
            source: ParseError::Parse {
                line: 1,
                message: "missing #usda header".to_string(),
            },
        });
    }

    let layer = parse_usda(content).map_err(|source| ReadError::Parse {
        path: path.to_string(),
        source,
    })?;

    let stage = Stage::from_layer(layer);
    if let Some(name) = &stage.metadata().default_prim {
        if stage.default_prim().is_none() {
            log::warn!("{}: defaultPrim '{}' does not name a root prim", path, name);
        }
    }
    Ok(stage)
}
