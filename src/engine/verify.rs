//! engine::verify
//!
//! Post-migration verification.
//!
//! [`VerifyingMigrator`] wraps another migrator. After the inner migration
//! succeeds it round-trips the result through the declared type and
//! compares top-level property names, ignoring version markers:
//!
//! - a property the round trip drops must be removed by a migration step
//! - a property the round trip adds must be added by a migration step
//!
//! Sequence documents are checked element by element against the first
//! generic argument of a collection type. When the element type is unknown
//! the branch is skipped rather than guessed. Scalars are not checked.
//!
//! # Re-entrancy
//!
//! A round trip may itself migrate (and so verify) documents of the type
//! being verified. The [`MigrationContext`] records which types are under
//! verification on the current call path; nested requests for the same
//! type migrate without verifying again.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::error::MigrationError;
use super::roundtrip::RoundTrip;
use super::{DataMigrator, Migrated};
use crate::core::catalog::{TypeCatalog, TypeKind};
use crate::core::context::MigrationContext;
use crate::core::types::TypeRef;
use crate::core::version::VersionField;

/// A migrator that rejects incomplete migrations.
#[derive(Debug)]
pub struct VerifyingMigrator<M, R> {
    inner: M,
    round_trip: R,
}

impl<M: DataMigrator, R: RoundTrip> VerifyingMigrator<M, R> {
    pub fn new(inner: M, round_trip: R) -> Self {
        Self { inner, round_trip }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    fn verify(
        &self,
        document: &Value,
        ty: &TypeRef,
        ctx: &MigrationContext<'_>,
    ) -> Result<(), MigrationError> {
        match document {
            Value::Array(items) => {
                let Some(element) = self.element_type(ty, ctx) else {
                    tracing::debug!(type_name = %ty, "element type unknown, skipping verification");
                    return Ok(());
                };
                items
                    .iter()
                    .try_for_each(|item| self.verify(item, element, ctx))
            }
            Value::Object(fields) => {
                let round_tripped = self
                    .round_trip
                    .round_trip(document, ty, ctx)
                    .map_err(|e| MigrationError::RoundTripFailed {
                        type_name: ty.name().clone(),
                        message: format!("{e:#}"),
                    })?;
                let Some(Value::Object(expected)) = round_tripped else {
                    tracing::debug!(type_name = %ty, "no round trip available, skipping verification");
                    return Ok(());
                };

                let version = self.inner.version_field();
                let actual = property_names(fields, version);
                let expected = property_names(&expected, version);

                let extra: Vec<String> = actual.difference(&expected).cloned().collect();
                let missing: Vec<String> = expected.difference(&actual).cloned().collect();
                if extra.is_empty() && missing.is_empty() {
                    return Ok(());
                }

                tracing::warn!(type_name = %ty, ?extra, ?missing, "migrated document failed verification");
                Err(MigrationError::VerificationMismatch {
                    type_name: ty.name().clone(),
                    extra,
                    missing,
                })
            }
            _ => Ok(()),
        }
    }

    fn element_type<'t>(&self, ty: &'t TypeRef, ctx: &MigrationContext<'_>) -> Option<&'t TypeRef> {
        let desc = ctx.catalog().describe(ty.name())?;
        if desc.kind != TypeKind::Collection {
            return None;
        }
        ty.args().first()
    }
}

fn property_names(fields: &Map<String, Value>, version: &dyn VersionField) -> BTreeSet<String> {
    fields
        .keys()
        .filter(|k| !version.is_version_name(k))
        .cloned()
        .collect()
}

impl<M: DataMigrator, R: RoundTrip> DataMigrator for VerifyingMigrator<M, R> {
    fn try_migrate(
        &self,
        document: Value,
        ty: &TypeRef,
        ctx: &MigrationContext<'_>,
    ) -> Result<Migrated, MigrationError> {
        let migrated = self.inner.try_migrate(document, ty, ctx)?;

        let Some(_guard) = ctx.enter_verification(ty.name()) else {
            tracing::trace!(type_name = %ty, "already verifying, skipping");
            return Ok(migrated);
        };
        self.verify(&migrated.document, ty, ctx)?;
        Ok(migrated)
    }

    fn catalog(&self) -> &dyn TypeCatalog {
        self.inner.catalog()
    }

    fn version_field(&self) -> &dyn VersionField {
        self.inner.version_field()
    }
}
