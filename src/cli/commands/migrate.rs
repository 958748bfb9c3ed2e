//! migrate command - Migrate a stored document

use super::parse_type;
use crate::cli::Context;
use anyhow::{Context as _, Result};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Migrate a JSON document and print the result to stdout.
///
/// Reads stdin when `file` is `None` or `-`.
pub fn migrate(ctx: &Context, ty: &str, file: Option<&Path>, nested: bool) -> Result<()> {
    let ty = parse_type(ty)?;
    let nested = nested && ctx.config.migrate_nested();
    let migrator = ctx.migrator(nested)?;

    let text = match file {
        Some(path) if path != Path::new("-") => {
            let path = ctx.cwd.join(path);
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read document from stdin")?;
            buf
        }
    };
    let document: Value = serde_json::from_str(&text).context("Failed to parse document")?;

    let migrated = migrator.migrate(document, &ty)?;
    if !ctx.quiet {
        if migrated.changed {
            eprintln!(
                "Migrated {} from version {} to {}.",
                ty, migrated.from_version, migrated.to_version
            );
        } else {
            eprintln!("{ty} is up to date (version {}).", migrated.to_version);
        }
    }
    println!("{}", serde_json::to_string_pretty(&migrated.document)?);
    Ok(())
}
