//! shape and hash commands - Inspect structural fingerprints

use super::parse_type;
use crate::cli::Context;
use crate::core::catalog::TypeRegistry;
use crate::core::shape::ShapeHasher;
use crate::core::version::VersionField;
use anyhow::Result;

fn hasher<'a>(ctx: &Context, registry: &'a TypeRegistry) -> ShapeHasher<'a> {
    let markers = ctx.config.version_field();
    ShapeHasher::new(registry).with_version_names(markers.names().to_vec())
}

/// Print the canonical shape of a type.
pub fn shape(ctx: &Context, ty: &str) -> Result<()> {
    let ty = parse_type(ty)?;
    let registry = ctx.registry()?;
    println!("{}", hasher(ctx, &registry).canonical_shape(&ty)?);
    Ok(())
}

/// Print the structural fingerprint of a type.
///
/// This is the value to record as the type's baseline.
pub fn hash(ctx: &Context, ty: &str) -> Result<()> {
    let ty = parse_type(ty)?;
    let registry = ctx.registry()?;
    println!("{}", hasher(ctx, &registry).fingerprint(&ty)?);
    Ok(())
}
