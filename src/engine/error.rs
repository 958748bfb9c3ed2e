//! engine::error
//!
//! Runtime migration errors.
//!
//! Every error is surfaced to the caller; nothing is retried or swallowed.
//! The only silent case is a type without migration metadata, which is a
//! legitimate no-op rather than an error.

use thiserror::Error;

use crate::core::chain::ChainError;
use crate::core::shape::ShapeError;
use crate::core::types::{SignatureType, TypeName};
use crate::core::version::VersionError;

/// Which side of a step a node kind check applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Input,
    Output,
}

impl std::fmt::Display for StepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepPhase::Input => write!(f, "input"),
            StepPhase::Output => write!(f, "output"),
        }
    }
}

/// Errors from migrating a document.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown type '{0}'")]
    UnknownType(TypeName),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(
        "type '{type_name}' has no invocable migration step to version {version} \
         ('{method}' has no bound body)"
    )]
    MissingMigrationStep {
        type_name: TypeName,
        version: u32,
        /// The declared step lacking a body.
        method: String,
    },

    #[error(
        "trying to load data type '{type_name}' at version {version}, \
         however this build only supports version {supported}. \
         Please update to a newer version."
    )]
    DataVersionTooHigh {
        type_name: TypeName,
        version: u32,
        supported: u32,
    },

    #[error("migration step '{method}' to version {to_version} failed: {message}")]
    StepFailed {
        method: String,
        to_version: u32,
        message: String,
    },

    #[error("migration step '{method}' declares {phase} type {expected} but the document is {found}")]
    StepTypeMismatch {
        method: String,
        phase: StepPhase,
        expected: SignatureType,
        found: &'static str,
    },

    #[error("invalid version marker in document of type '{type_name}': {source}")]
    InvalidVersionMarker {
        type_name: TypeName,
        #[source]
        source: VersionError,
    },

    #[error("{}", describe_mismatch(.type_name, .extra, .missing))]
    VerificationMismatch {
        type_name: TypeName,
        /// Properties the round trip dropped.
        extra: Vec<String>,
        /// Properties the round trip added.
        missing: Vec<String>,
    },

    #[error("failed to round-trip document of type '{type_name}': {message}")]
    RoundTripFailed { type_name: TypeName, message: String },
}

fn describe_mismatch(type_name: &TypeName, extra: &[String], missing: &[String]) -> String {
    let mut parts = Vec::new();
    if !extra.is_empty() {
        parts.push(format!(
            "properties [{}] don't exist in type '{type_name}' and must be removed by a migration step",
            extra.join(", ")
        ));
    }
    if !missing.is_empty() {
        parts.push(format!(
            "properties [{}] exist in type '{type_name}' and must be added by a migration step",
            missing.join(", ")
        ));
    }
    format!("migrated document does not match type '{type_name}': {}", parts.join("; "))
}
