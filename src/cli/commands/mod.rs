//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls into core or the engine
//! 3. Formats and displays output
//!
//! Handlers return errors instead of exiting so they can be driven
//! directly from tests.

mod chain;
mod check;
mod completion;
mod init;
mod migrate;
mod shape;

// Re-export command functions for testing and direct invocation
pub use chain::chain;
pub use check::{check, CheckOutcome, CheckReport};
pub use completion::completion;
pub use init::init;
pub use migrate::migrate;
pub use shape::{hash, shape};

use crate::cli::args::Command;
use crate::cli::Context;
use crate::core::types::TypeRef;
use anyhow::{Context as _, Result};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Shape { ty } => shape(ctx, &ty),
        Command::Hash { ty } => hash(ctx, &ty),
        Command::Check { types, scope } => {
            let report = check(ctx, &types, scope)?;
            report.print(ctx.quiet);
            report.into_result()
        }
        Command::Chain { ty } => chain(ctx, &ty),
        Command::Migrate {
            ty,
            file,
            no_nested,
            ..
        } => migrate(ctx, &ty, file.as_deref(), !no_nested),
        Command::Init { force } => init(ctx, force),
        Command::Completion { shell } => completion(shell),
    }
}

/// Parse a type reference given on the command line.
pub(crate) fn parse_type(input: &str) -> Result<TypeRef> {
    crate::engine::declared_type(input).with_context(|| format!("Invalid type reference '{input}'"))
}
