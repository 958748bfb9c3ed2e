//! chain command - Show a type's resolved migration chain

use super::parse_type;
use crate::cli::Context;
use crate::core::chain::ChainResolver;
use anyhow::Result;

/// Print the resolved migration chain of a type.
pub fn chain(ctx: &Context, ty: &str) -> Result<()> {
    let ty = parse_type(ty)?;
    let registry = ctx.registry()?;
    let chain = ChainResolver::new(&registry).resolve(ty.name())?;

    if chain.host == chain.type_name {
        println!("{} (current version {})", chain.type_name, chain.max_version());
    } else {
        println!(
            "{} (current version {}, migrated by {})",
            chain.type_name,
            chain.max_version(),
            chain.host
        );
    }

    if chain.is_empty() {
        if !ctx.quiet {
            println!("  no migration steps");
        }
        return Ok(());
    }

    for step in &chain.steps {
        println!(
            "  {:>3}  {}(data: {}, context: context) -> {}",
            step.to_version, step.method, step.input, step.output
        );
    }
    Ok(())
}
