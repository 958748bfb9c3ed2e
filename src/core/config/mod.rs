//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! docmigrate has two configuration scopes:
//! - **Global**: User-level settings
//! - **Project**: Per-project catalogs and migration policy
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$DOCMIGRATE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/docmigrate/config.toml`
//! 3. `~/.docmigrate/config.toml` (canonical write location)
//!
//! # Project Config Locations
//!
//! Searched in order:
//! 1. `.docmigrate/config.toml` (canonical)
//! 2. `docmigrate.toml` (compatibility, warns)
//!
//! # Example
//!
//! ```no_run
//! use docmigrate::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/project"))).unwrap();
//! let config = result.config;
//!
//! for catalog in config.catalogs() {
//!     println!("Catalog: {}", catalog.display());
//! }
//! println!("Verify: {}", config.verify());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, ProjectConfig, VersionConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::shape::BaselineScope;
use crate::core::version::{JsonVersionField, LEGACY_VERSION_PROPERTY, VERSION_PROPERTY};

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: project config overrides global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Project configuration (if found)
    pub project: Option<ProjectConfig>,
    /// Directory relative catalog paths resolve against
    project_dir: Option<PathBuf>,
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `project_dir` is provided, also loads project config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(project_dir: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let (global, global_path) = Self::load_global()?;

        let (project, project_path) = match project_dir {
            Some(dir) => Self::load_project(dir, &mut warnings)?,
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                project,
                project_dir: project_dir.map(Path::to_path_buf),
                global_path,
                project_path,
            },
            warnings,
        })
    }

    fn load_global() -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        // 1. $DOCMIGRATE_CONFIG
        if let Ok(path) = std::env::var("DOCMIGRATE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok((read_toml(&path)?, Some(path)));
            }
        }

        // 2. $XDG_CONFIG_HOME/docmigrate/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("docmigrate/config.toml");
            if path.exists() {
                return Ok((read_toml(&path)?, Some(path)));
            }
        }

        // 3. ~/.docmigrate/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".docmigrate/config.toml");
            if path.exists() {
                return Ok((read_toml(&path)?, Some(path)));
            }
        }

        Ok((GlobalConfig::default(), None))
    }

    fn load_project(
        dir: &Path,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<(Option<ProjectConfig>, Option<PathBuf>), ConfigError> {
        let canonical = Self::project_config_path(dir);
        if canonical.exists() {
            return Ok((Some(read_toml(&canonical)?), Some(canonical)));
        }

        let compat = dir.join("docmigrate.toml");
        if compat.exists() {
            warnings.push(ConfigWarning {
                message: format!(
                    "Using deprecated config location. Please move to '{}'",
                    canonical.display()
                ),
                path: compat.clone(),
            });
            return Ok((Some(read_toml(&compat)?), Some(compat)));
        }

        Ok((None, None))
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.docmigrate/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".docmigrate/config.toml"))
    }

    /// Get the canonical path for project config.
    pub fn project_config_path(dir: &Path) -> PathBuf {
        dir.join(".docmigrate/config.toml")
    }

    /// Write project config atomically.
    ///
    /// Creates parent directories if needed. Writes to a temp file, then
    /// renames it into place.
    pub fn write_project(dir: &Path, config: &ProjectConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::project_config_path(dir);
        write_config_atomic(&path, config)?;
        Ok(path)
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Tracing filter to use when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> Option<&str> {
        self.global.log_filter.as_deref()
    }

    /// Whether migrated documents are verified.
    ///
    /// Defaults to `false` if not configured.
    pub fn verify(&self) -> bool {
        self.project
            .as_ref()
            .and_then(|p| p.verify)
            .or(self.global.verify)
            .unwrap_or(false)
    }

    /// Whether migratable members are migrated along with their parent.
    ///
    /// Defaults to `true` if not configured.
    pub fn migrate_nested(&self) -> bool {
        self.project
            .as_ref()
            .and_then(|p| p.migrate_nested)
            .unwrap_or(true)
    }

    /// Baseline scope for types with a bound migrator.
    pub fn baseline_scope(&self) -> BaselineScope {
        self.project
            .as_ref()
            .and_then(|p| p.baseline_scope)
            .unwrap_or_default()
    }

    /// Catalog files, resolved against the project directory.
    pub fn catalogs(&self) -> Vec<PathBuf> {
        let base = self.project_dir.as_deref().unwrap_or(Path::new("."));
        self.project
            .as_ref()
            .and_then(|p| p.catalogs.as_ref())
            .map(|paths| paths.iter().map(|p| base.join(p)).collect())
            .unwrap_or_default()
    }

    /// The version marker protocol described by this config.
    pub fn version_field(&self) -> JsonVersionField {
        let version = self.project.as_ref().and_then(|p| p.version.as_ref());
        let property = version
            .and_then(|v| v.property.clone())
            .unwrap_or_else(|| VERSION_PROPERTY.to_string());
        let legacy = version
            .and_then(|v| v.legacy.clone())
            .unwrap_or_else(|| vec![LEGACY_VERSION_PROPERTY.to_string()]);
        JsonVersionField::new(property, legacy)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded project config file.
    pub fn project_config_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_config_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    // Same directory as the target so the rename stays on one filesystem.
    let temp_path = path.with_extension("toml.tmp");
    let write_err = |e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;
    file.write_all(contents.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::VersionField;
    use tempfile::TempDir;

    #[test]
    fn project_defaults() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(Some(temp.path())).unwrap();
        let config = result.config;

        assert!(config.project.is_none());
        assert!(config.migrate_nested());
        assert_eq!(config.baseline_scope(), BaselineScope::Declared);
        assert!(config.catalogs().is_empty());
        assert_eq!(config.version_field().names(), ["Version", "<>Version"]);
    }

    #[test]
    fn load_global_from_env() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "log_filter = \"docmigrate=trace\"\n").unwrap();

        std::env::set_var("DOCMIGRATE_CONFIG", config_path.to_str().unwrap());
        let result = Config::load(None).unwrap();
        std::env::remove_var("DOCMIGRATE_CONFIG");

        assert_eq!(result.config.log_filter(), Some("docmigrate=trace"));
        assert_eq!(
            result.config.global_config_loaded_from(),
            Some(config_path.as_path())
        );
    }

    #[test]
    fn load_project_config() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".docmigrate");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            r#"
            catalogs = ["types.toml"]
            verify = true
            baseline_scope = "migrator"

            [version]
            property = "v"
            legacy = []
            "#,
        )
        .unwrap();

        let result = Config::load(Some(temp.path())).unwrap();
        let config = result.config;

        assert!(result.warnings.is_empty());
        assert!(config.verify());
        assert_eq!(config.baseline_scope(), BaselineScope::Migrator);
        assert_eq!(config.catalogs(), vec![temp.path().join("types.toml")]);
        assert_eq!(config.version_field().names(), ["v"]);
    }

    #[test]
    fn load_project_compat_warns() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("docmigrate.toml"), "verify = true").unwrap();

        let result = Config::load(Some(temp.path())).unwrap();

        assert!(result.config.verify());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("deprecated"));
    }

    #[test]
    fn write_project_config_atomic() {
        let temp = TempDir::new().unwrap();
        let config = ProjectConfig {
            catalogs: Some(vec![PathBuf::from("schema.json")]),
            migrate_nested: Some(false),
            ..Default::default()
        };

        let path = Config::write_project(temp.path(), &config).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());
        let loaded = Config::load(Some(temp.path())).unwrap();
        assert!(!loaded.config.migrate_nested());
        assert_eq!(loaded.config.project_config_loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("docmigrate.toml"), "unknown_field = true").unwrap();

        let result = Config::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn precedence_project_overrides_global() {
        let config = Config {
            global: GlobalConfig {
                verify: Some(true),
                ..Default::default()
            },
            project: Some(ProjectConfig {
                verify: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!config.verify());

        let global_only = Config {
            global: GlobalConfig {
                verify: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(global_only.verify());
    }
}
