//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$DOCMIGRATE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/docmigrate/config.toml`
//! 3. `~/.docmigrate/config.toml` (canonical write location)
//!
//! # Project Config
//!
//! Located at `.docmigrate/config.toml` (canonical).
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the log filter must be a valid filter directive).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ConfigError;
use crate::core::catalog::store::CatalogFormat;
use crate::core::shape::BaselineScope;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// log_filter = "docmigrate=info"
/// verify = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: Option<String>,

    /// Verify migrated documents by default
    pub verify: Option<bool>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(filter) = &self.log_filter {
            tracing_subscriber::EnvFilter::try_new(filter).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid log_filter '{filter}': {e}"))
            })?;
        }
        Ok(())
    }
}

/// Project configuration.
///
/// # Example
///
/// ```toml
/// catalogs = ["schema/types.toml"]
/// verify = true
/// migrate_nested = true
/// baseline_scope = "declared"
///
/// [version]
/// property = "Version"
/// legacy = ["<>Version"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Catalog files, relative to the project directory
    pub catalogs: Option<Vec<PathBuf>>,

    /// Verify migrated documents
    pub verify: Option<bool>,

    /// Migrate migratable members of migrated documents
    pub migrate_nested: Option<bool>,

    /// Which baselines must match for types with a bound migrator
    pub baseline_scope: Option<BaselineScope>,

    /// Version marker naming
    pub version: Option<VersionConfig>,
}

impl ProjectConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for catalog in self.catalogs.iter().flatten() {
            CatalogFormat::from_path(catalog).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid catalog entry: {e}"))
            })?;
        }

        if let Some(version) = &self.version {
            version.validate()?;
        }

        Ok(())
    }
}

/// Version marker naming.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VersionConfig {
    /// Canonical marker property
    pub property: Option<String>,

    /// Legacy aliases still read
    pub legacy: Option<Vec<String>>,
}

impl VersionConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a name is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = self.property.iter().chain(self.legacy.iter().flatten());
        for name in names {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "version marker names cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
