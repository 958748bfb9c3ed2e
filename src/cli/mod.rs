//! cli
//!
//! Command-line interface layer for docmigrate.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and install logging
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, resolves
//! configuration into a [`Context`] and dispatches to handlers that call
//! into [`crate::core`] and [`crate::engine`].

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::catalog::TypeRegistry;
use crate::core::config::Config;
use crate::engine::{
    DataMigrator, DescriptorRoundTrip, Migrator, NestedMigrator, VerifyingMigrator,
};

/// Resolved settings for one command invocation.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory
    pub cwd: PathBuf,
    /// Minimal output
    pub quiet: bool,
    /// Catalog files from `--catalog`; empty means use the config
    pub catalogs: Vec<PathBuf>,
    /// Explicit verification choice from the command line
    pub verify: Option<bool>,
    /// Merged configuration
    pub config: Config,
}

impl Context {
    /// Catalog files to load, CLI first, then config.
    pub fn catalog_paths(&self) -> Vec<PathBuf> {
        if self.catalogs.is_empty() {
            self.config.catalogs()
        } else {
            self.catalogs.iter().map(|p| self.cwd.join(p)).collect()
        }
    }

    /// Load the type registry from the catalog files.
    pub fn registry(&self) -> Result<TypeRegistry> {
        let paths = self.catalog_paths();
        if paths.is_empty() {
            anyhow::bail!(
                "no catalogs configured; pass --catalog <FILE> or list `catalogs` in .docmigrate/config.toml"
            );
        }
        TypeRegistry::load_files(&paths).context("Failed to load type catalogs")
    }

    /// Whether migrated documents are verified.
    pub fn verify(&self) -> bool {
        self.verify.unwrap_or_else(|| self.config.verify())
    }

    /// The configured migrator stack.
    pub fn migrator(&self, nested: bool) -> Result<Box<dyn DataMigrator>> {
        let base = Migrator::new(Arc::new(self.registry()?))
            .with_version_field(Box::new(self.config.version_field()));

        Ok(match (nested, self.verify()) {
            (true, true) => Box::new(VerifyingMigrator::new(
                NestedMigrator::new(base),
                DescriptorRoundTrip,
            )),
            (true, false) => Box::new(NestedMigrator::new(base)),
            (false, true) => Box::new(VerifyingMigrator::new(base, DescriptorRoundTrip)),
            (false, false) => Box::new(base),
        })
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let cwd = match cli.cwd.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let loaded = Config::load(Some(&cwd)).context("Failed to load configuration")?;
    init_tracing(cli.debug, loaded.config.log_filter());

    for warning in &loaded.warnings {
        tracing::warn!(path = %warning.path.display(), "{}", warning.message);
    }

    let ctx = Context {
        cwd,
        quiet: cli.quiet,
        catalogs: cli.catalogs.clone(),
        verify: cli.verify_flag(),
        config: loaded.config,
    };

    commands::dispatch(cli.command, &ctx)
}

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins, then `--debug`, then the configured filter.
fn init_tracing(debug: bool, configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = if debug {
            "docmigrate=debug"
        } else {
            configured.unwrap_or("docmigrate=warn")
        };
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("docmigrate=warn"))
    });

    // A subscriber may already be installed when running under a test harness.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
