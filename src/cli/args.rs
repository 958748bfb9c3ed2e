//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--catalog <file>`: Catalog file to load (repeatable; overrides config)
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docmigrate - Versioned migrations for persisted JSON documents
#[derive(Parser, Debug)]
#[command(name = "docmigrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if docmigrate was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Catalog file to load; repeat for several. Replaces configured catalogs
    #[arg(long = "catalog", value_name = "FILE", global = true)]
    pub catalogs: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the canonical shape of a type
    #[command(
        name = "shape",
        long_about = "Print the canonical shape string of a type.\n\n\
            The shape is what the structural fingerprint is computed from: \
            primitives by name, collections with their arguments, composites \
            with their serialized members sorted. Use it to see why a \
            fingerprint changed.",
        after_help = "\
EXAMPLES:
    docmigrate shape app::Person
    docmigrate shape 'Vec<app::Person>'"
    )]
    Shape {
        /// Type reference, e.g. `app::Person` or `Vec<app::Person>`
        #[arg(value_name = "TYPE")]
        ty: String,
    },

    /// Print the structural fingerprint of a type
    #[command(
        name = "hash",
        long_about = "Print the structural fingerprint of a type.\n\n\
            Record this value as the type's baseline. Any later change to \
            the serialized shape changes the fingerprint and is reported by \
            `docmigrate check` until a migration step is added and the \
            baseline updated.",
        after_help = "\
EXAMPLES:
    docmigrate hash app::Person"
    )]
    Hash {
        /// Type reference
        #[arg(value_name = "TYPE")]
        ty: String,
    },

    /// Check baselines and migration chains
    #[command(
        name = "check",
        long_about = "Check recorded baselines and migration chains.\n\n\
            For each type, compares the recorded baseline with a freshly \
            computed fingerprint and verifies that the migration steps are \
            numbered from 1 without gaps and have well-formed signatures. \
            Prints one line per type and exits non-zero if any check fails.",
        after_help = "\
EXAMPLES:
    # Check every migratable type in the configured catalogs
    docmigrate check

    # Check specific types against an explicit catalog
    docmigrate --catalog types.toml check app::Person app::Address"
    )]
    Check {
        /// Types to check; defaults to every migratable type
        #[arg(value_name = "TYPE")]
        types: Vec<String>,

        /// Which baselines must match for types with a bound migrator
        #[arg(long, value_name = "SCOPE")]
        scope: Option<crate::core::shape::BaselineScope>,
    },

    /// Show the resolved migration chain of a type
    #[command(
        name = "chain",
        after_help = "\
EXAMPLES:
    docmigrate chain app::Person"
    )]
    Chain {
        /// Type reference
        #[arg(value_name = "TYPE")]
        ty: String,
    },

    /// Migrate a JSON document to the current version of its type
    #[command(
        name = "migrate",
        long_about = "Migrate a JSON document and print the result.\n\n\
            Reads the document from FILE, or stdin when FILE is omitted or `-`. \
            Steps need bound bodies, so catalogs loaded from files can only \
            carry documents that are already up to date; use this to verify \
            stored documents against their declared type.",
        after_help = "\
EXAMPLES:
    docmigrate migrate app::Person data/person.json --verify
    cat person.json | docmigrate migrate app::Person"
    )]
    Migrate {
        /// Declared type of the document
        #[arg(value_name = "TYPE")]
        ty: String,

        /// Document to read; stdin if omitted
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Verify the migrated document against its type
        #[arg(long, conflicts_with = "no_verify")]
        verify: bool,

        /// Skip verification even if configured
        #[arg(long)]
        no_verify: bool,

        /// Do not migrate nested documents
        #[arg(long)]
        no_nested: bool,
    },

    /// Write a default project configuration
    #[command(
        name = "init",
        long_about = "Write a default project configuration.\n\n\
            Creates `.docmigrate/config.toml` in the current directory. Refuses \
            to overwrite an existing file unless --force is given."
    )]
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    # Bash
    docmigrate completion bash > /etc/bash_completion.d/docmigrate

    # Zsh
    docmigrate completion zsh > \"${fpath[1]}/_docmigrate\"

    # Fish
    docmigrate completion fish > ~/.config/fish/completions/docmigrate.fish

    # PowerShell
    docmigrate completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Explicit verification choice, if one was given.
    pub fn verify_flag(&self) -> Option<bool> {
        match &self.command {
            Command::Migrate { verify: true, .. } => Some(true),
            Command::Migrate {
                no_verify: true, ..
            } => Some(false),
            _ => None,
        }
    }
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn catalogs_repeat_and_are_global() {
        let cli = Cli::try_parse_from([
            "docmigrate",
            "check",
            "--catalog",
            "a.toml",
            "--catalog",
            "b.json",
            "app::A",
        ])
        .unwrap();
        assert_eq!(cli.catalogs, vec![PathBuf::from("a.toml"), PathBuf::from("b.json")]);
        assert!(matches!(cli.command, Command::Check { ref types, .. } if types == &["app::A"]));
    }

    #[test]
    fn verify_flags() {
        let cli = Cli::try_parse_from(["docmigrate", "migrate", "app::A", "--verify"]).unwrap();
        assert_eq!(cli.verify_flag(), Some(true));
        let cli = Cli::try_parse_from(["docmigrate", "migrate", "app::A", "--no-verify"]).unwrap();
        assert_eq!(cli.verify_flag(), Some(false));
        let cli = Cli::try_parse_from(["docmigrate", "migrate", "app::A"]).unwrap();
        assert_eq!(cli.verify_flag(), None);
        assert!(
            Cli::try_parse_from(["docmigrate", "migrate", "app::A", "--verify", "--no-verify"])
                .is_err()
        );
    }

    #[test]
    fn scope_parses() {
        let cli = Cli::try_parse_from(["docmigrate", "check", "--scope", "both"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Check {
                scope: Some(crate::core::shape::BaselineScope::Both),
                ..
            }
        ));
    }
}
