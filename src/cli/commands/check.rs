//! check command - Verify baselines and migration chains

use super::parse_type;
use crate::cli::Context;
use crate::core::catalog::TypeRegistry;
use crate::core::chain::ChainResolver;
use crate::core::shape::{check_baseline, BaselineScope};
use crate::core::types::{Fingerprint, TypeName};
use crate::core::version::VersionField;
use anyhow::Result;

/// Result of checking one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Baseline matches and the chain is valid.
    Ok {
        fingerprint: Fingerprint,
        version: u32,
    },
    /// The type has no migration metadata.
    NotMigratable,
    /// One or more checks failed.
    Failed(Vec<String>),
}

/// Outcomes for every checked type, in check order.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub results: Vec<(TypeName, CheckOutcome)>,
}

impl CheckReport {
    pub fn failures(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, o)| matches!(o, CheckOutcome::Failed(_)))
            .count()
    }

    pub fn print(&self, quiet: bool) {
        for (name, outcome) in &self.results {
            match outcome {
                CheckOutcome::Ok {
                    fingerprint,
                    version,
                } if !quiet => println!("ok    {name} v{version} {fingerprint}"),
                CheckOutcome::NotMigratable if !quiet => println!("skip  {name} (not migratable)"),
                CheckOutcome::Failed(problems) => {
                    println!("FAIL  {name}");
                    for line in problems.iter().flat_map(|p| p.lines()) {
                        println!("      {line}");
                    }
                }
                _ => {}
            }
        }
    }

    /// Fails when any type failed.
    pub fn into_result(self) -> Result<()> {
        match self.failures() {
            0 => Ok(()),
            n => anyhow::bail!("{n} of {} type(s) failed checks", self.results.len()),
        }
    }
}

/// Check recorded baselines and chains.
///
/// With no `types`, every migratable type in the catalogs is checked.
pub fn check(ctx: &Context, types: &[String], scope: Option<BaselineScope>) -> Result<CheckReport> {
    let registry = ctx.registry()?;
    let scope = scope.unwrap_or_else(|| ctx.config.baseline_scope());
    let markers = ctx.config.version_field();

    let names: Vec<TypeName> = if types.is_empty() {
        registry
            .iter()
            .filter(|desc| desc.migration.is_some())
            .map(|desc| desc.name.clone())
            .collect()
    } else {
        types
            .iter()
            .map(|t| parse_type(t).map(|r| r.name().clone()))
            .collect::<Result<_>>()?
    };

    let results = names
        .into_iter()
        .map(|name| {
            let outcome = check_type(&registry, &name, scope, markers.names());
            (name, outcome)
        })
        .collect();
    Ok(CheckReport { results })
}

fn check_type(
    registry: &TypeRegistry,
    name: &TypeName,
    scope: BaselineScope,
    version_names: &[String],
) -> CheckOutcome {
    let mut problems = Vec::new();

    let fingerprint = match check_baseline(registry, name, scope, version_names) {
        Ok(Some(fp)) => Some(fp),
        Ok(None) => return CheckOutcome::NotMigratable,
        Err(e) => {
            problems.push(e.to_string());
            None
        }
    };

    let version = match ChainResolver::new(registry).resolve(name) {
        Ok(chain) => chain.max_version(),
        Err(e) => {
            problems.push(e.to_string());
            0
        }
    };

    match fingerprint {
        Some(fingerprint) if problems.is_empty() => CheckOutcome::Ok {
            fingerprint,
            version,
        },
        _ => CheckOutcome::Failed(problems),
    }
}
