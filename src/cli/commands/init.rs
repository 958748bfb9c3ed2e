//! init command - Write a default project configuration

use crate::cli::Context;
use crate::core::config::{Config, ProjectConfig, VersionConfig};
use crate::core::shape::BaselineScope;
use crate::core::version::{LEGACY_VERSION_PROPERTY, VERSION_PROPERTY};
use anyhow::{Context as _, Result};
use std::path::PathBuf;

/// Write `.docmigrate/config.toml` in the working directory.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `force` - Overwrite an existing configuration
pub fn init(ctx: &Context, force: bool) -> Result<()> {
    let path = Config::project_config_path(&ctx.cwd);
    if path.exists() && !force {
        if !ctx.quiet {
            println!("docmigrate is already initialized ({}).", path.display());
            println!("Use --force to overwrite.");
        }
        return Ok(());
    }

    let config = default_project_config(ctx);
    config.validate().context("Invalid default configuration")?;
    let written = Config::write_project(&ctx.cwd, &config).context("Failed to write configuration")?;

    if !ctx.quiet {
        println!("Wrote {}", written.display());
    }
    Ok(())
}

fn default_project_config(ctx: &Context) -> ProjectConfig {
    // Keep catalogs given on the command line so a later run needs no flags.
    let catalogs = if ctx.catalogs.is_empty() {
        vec![PathBuf::from("catalog.toml")]
    } else {
        ctx.catalogs.clone()
    };

    ProjectConfig {
        catalogs: Some(catalogs),
        verify: Some(false),
        migrate_nested: Some(true),
        baseline_scope: Some(BaselineScope::Declared),
        version: Some(VersionConfig {
            property: Some(VERSION_PROPERTY.to_string()),
            legacy: Some(vec![LEGACY_VERSION_PROPERTY.to_string()]),
        }),
    }
}
