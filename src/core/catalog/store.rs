//! core::catalog::store
//!
//! Catalog files.
//!
//! A catalog file lists type descriptors under `types`. The format is
//! chosen by extension: `.toml` or `.json`.
//!
//! ```toml
//! [[types]]
//! name = "app::Person"
//! members = [{ name = "Name", type = "String" }]
//! methods = [{ name = "migrate_1", params = ["object", "context"], returns = "object" }]
//!
//! [types.migration]
//! baseline = "5f0c..."
//! ```
//!
//! Files describe signatures only. Step bodies are bound in code, so a
//! registry loaded from files supports hashing, drift checks and static
//! chain verification but cannot run migrations.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::{CatalogError, TypeDescriptor, TypeRegistry};

/// On-disk catalog layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

/// Supported catalog encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Toml,
    Json,
}

impl CatalogFormat {
    /// Pick a format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Parse catalog contents.
///
/// `path` is only used in error messages.
pub fn parse_catalog(
    contents: &str,
    format: CatalogFormat,
    path: &Path,
) -> Result<CatalogFile, CatalogError> {
    let parsed = match format {
        CatalogFormat::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
        CatalogFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| CatalogError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Read and parse a catalog file.
pub fn read_catalog(path: &Path) -> Result<CatalogFile, CatalogError> {
    let format = CatalogFormat::from_path(path)?;
    let contents = fs::read_to_string(path).map_err(|e| CatalogError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_catalog(&contents, format, path)
}

impl TypeRegistry {
    /// Build a registry from builtins plus every type in `paths`.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable or malformed file, or on a type
    /// described more than once across files.
    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, CatalogError> {
        let mut registry = Self::with_builtins();
        for path in paths {
            let path = path.as_ref();
            let file = read_catalog(path)?;
            tracing::debug!(path = %path.display(), types = file.types.len(), "loaded catalog");
            for desc in file.types {
                registry.register(desc)?;
            }
        }
        Ok(registry)
    }
}
