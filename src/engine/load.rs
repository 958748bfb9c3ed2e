//! engine::load
//!
//! Migrate-then-deserialize entry points.
//!
//! These are the functions an application calls when reading stored data:
//! the raw document is brought up to the current version of its declared
//! type, then handed to serde.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::error::MigrationError;
use super::DataMigrator;
use crate::core::types::TypeRef;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to parse document: {0}")]
    Parse(#[source] serde_json::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("failed to deserialize migrated document: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Migrate `document` as `ty` and deserialize the result into `T`.
pub fn from_value<T, M>(migrator: &M, document: Value, ty: &TypeRef) -> Result<T, LoadError>
where
    T: DeserializeOwned,
    M: DataMigrator + ?Sized,
{
    let migrated = migrator.migrate(document, ty)?;
    if migrated.changed {
        tracing::debug!(
            type_name = %ty,
            from = migrated.from_version,
            to = migrated.to_version,
            "loaded migrated document"
        );
    }
    serde_json::from_value(migrated.document).map_err(LoadError::Deserialize)
}

/// Parse JSON text, then [`from_value`].
pub fn from_str<T, M>(migrator: &M, json: &str, ty: &TypeRef) -> Result<T, LoadError>
where
    T: DeserializeOwned,
    M: DataMigrator + ?Sized,
{
    let document: Value = serde_json::from_str(json).map_err(LoadError::Parse)?;
    from_value(migrator, document, ty)
}
