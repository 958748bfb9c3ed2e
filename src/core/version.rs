//! core::version
//!
//! The version-marker protocol.
//!
//! A document records which migration step it has already received in an
//! integer property. The property name and its legacy aliases are part of a
//! [`VersionField`] value handed to the executor at construction; no
//! naming convention is global.

use serde_json::Value;
use thiserror::Error;

/// Canonical name of the version marker.
pub const VERSION_PROPERTY: &str = "Version";

/// Legacy alias still read from older documents.
pub const LEGACY_VERSION_PROPERTY: &str = "<>Version";

/// Errors from reading a version marker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version marker '{property}' must be a non-negative integer, found {found}")]
    InvalidMarker { property: String, found: String },
}

/// Reads and writes a document's version marker.
pub trait VersionField: Send + Sync + std::fmt::Debug {
    /// Every recognized marker name, canonical first.
    fn names(&self) -> &[String];

    fn is_version_name(&self, name: &str) -> bool {
        self.names().iter().any(|n| n == name)
    }

    /// The document's version; 0 if unmarked or not a composite node.
    fn get_version(&self, doc: &Value) -> Result<u32, VersionError>;

    /// Record `version` in the document. Non-composite nodes are left as is.
    fn set_version(&self, doc: &mut Value, version: u32);
}

/// Version marker stored as a top-level JSON property.
#[derive(Debug, Clone)]
pub struct JsonVersionField {
    names: Vec<String>,
}

impl JsonVersionField {
    /// A marker named `property`, also reading `legacy` aliases.
    pub fn new(property: impl Into<String>, legacy: impl IntoIterator<Item = String>) -> Self {
        let mut names = vec![property.into()];
        for alias in legacy {
            if !names.contains(&alias) {
                names.push(alias);
            }
        }
        Self { names }
    }

    /// The canonical name written back into documents.
    pub fn property(&self) -> &str {
        &self.names[0]
    }
}

impl Default for JsonVersionField {
    fn default() -> Self {
        Self::new(VERSION_PROPERTY, [LEGACY_VERSION_PROPERTY.to_string()])
    }
}

impl VersionField for JsonVersionField {
    fn names(&self) -> &[String] {
        &self.names
    }

    fn get_version(&self, doc: &Value) -> Result<u32, VersionError> {
        let Value::Object(map) = doc else {
            return Ok(0);
        };

        let Some((property, marker)) = self
            .names
            .iter()
            .find_map(|n| map.get(n).map(|v| (n, v)))
        else {
            return Ok(0);
        };

        marker
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| VersionError::InvalidMarker {
                property: property.clone(),
                found: marker.to_string(),
            })
    }

    fn set_version(&self, doc: &mut Value, version: u32) {
        let Value::Object(map) = doc else {
            return;
        };
        for alias in &self.names[1..] {
            map.remove(alias);
        }
        map.insert(self.property().to_string(), Value::from(version));
    }
}
