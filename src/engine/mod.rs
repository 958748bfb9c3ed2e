//! engine
//!
//! Runtime migration of documents.
//!
//! # Architecture
//!
//! Migrators compose as decorators around the core executor:
//!
//! ```text
//! VerifyingMigrator -> NestedMigrator -> Migrator
//! ```
//!
//! 1. [`Migrator`] resolves the declared type's chain and advances the
//!    document one version at a time
//! 2. [`NestedMigrator`] also migrates every member whose declared type is
//!    migratable, through collections
//! 3. [`VerifyingMigrator`] round-trips the result through the type's own
//!    serialization rules and rejects incomplete migrations
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use docmigrate::core::catalog::{TypeDescriptor, TypeRegistry};
//! use docmigrate::core::types::{SignatureType, TypeRef};
//! use docmigrate::engine::{DataMigrator, Migrator};
//! use serde_json::json;
//!
//! let person = TypeDescriptor::composite("app::Person").unwrap()
//!     .member("Name", "String").unwrap()
//!     .step(1, SignatureType::Object, SignatureType::Object, |mut doc, _ctx| {
//!         doc["Name"] = json!("unknown");
//!         Ok(doc)
//!     })
//!     .migratable(None);
//! let registry = TypeRegistry::with_builtins().with(person).unwrap();
//!
//! let migrator = Migrator::new(Arc::new(registry));
//! let result = migrator
//!     .migrate(json!({}), &TypeRef::parse("app::Person").unwrap())
//!     .unwrap();
//! assert_eq!(result.document, json!({"Name": "unknown", "Version": 1}));
//! assert!(result.changed);
//! ```

pub mod error;
pub mod exec;
pub mod load;
pub mod nested;
pub mod roundtrip;
pub mod verify;

pub use error::{MigrationError, StepPhase};
pub use exec::{Migrator, MigratorOptions};
pub use load::LoadError;
pub use nested::NestedMigrator;
pub use roundtrip::{DescriptorRoundTrip, RoundTrip, SerdeRoundTrip};
pub use verify::VerifyingMigrator;

use serde_json::Value;

use crate::core::catalog::TypeCatalog;
use crate::core::context::MigrationContext;
use crate::core::types::TypeRef;
use crate::core::version::VersionField;

/// Parse a declared type given as text.
///
/// An empty or malformed reference is an invalid argument to migration.
pub fn declared_type(input: &str) -> Result<TypeRef, MigrationError> {
    TypeRef::parse(input)
        .map_err(|e| MigrationError::InvalidArgument(format!("declared type: {e}")))
}

/// Outcome of a migration.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    /// The migrated document.
    pub document: Value,
    /// Whether any step ran.
    pub changed: bool,
    /// Version found on entry.
    pub from_version: u32,
    /// Version after migration.
    pub to_version: u32,
}

impl Migrated {
    /// A document returned as is.
    pub fn unchanged(document: Value, version: u32) -> Self {
        Self {
            document,
            changed: false,
            from_version: version,
            to_version: version,
        }
    }
}

/// Migrates documents of a declared type.
pub trait DataMigrator {
    /// Migrate `document` to the current version of `ty`.
    fn try_migrate(
        &self,
        document: Value,
        ty: &TypeRef,
        ctx: &MigrationContext<'_>,
    ) -> Result<Migrated, MigrationError>;

    /// The catalog types are looked up in.
    fn catalog(&self) -> &dyn TypeCatalog;

    /// The version marker protocol.
    fn version_field(&self) -> &dyn VersionField;

    /// A fresh context for one migration call path.
    fn context(&self) -> MigrationContext<'_> {
        MigrationContext::new(self.catalog())
    }

    /// Migrate with a fresh context.
    fn migrate(&self, document: Value, ty: &TypeRef) -> Result<Migrated, MigrationError> {
        let ctx = self.context();
        self.try_migrate(document, ty, &ctx)
    }
}

impl<T: DataMigrator + ?Sized> DataMigrator for &T {
    fn try_migrate(
        &self,
        document: Value,
        ty: &TypeRef,
        ctx: &MigrationContext<'_>,
    ) -> Result<Migrated, MigrationError> {
        (**self).try_migrate(document, ty, ctx)
    }

    fn catalog(&self) -> &dyn TypeCatalog {
        (**self).catalog()
    }

    fn version_field(&self) -> &dyn VersionField {
        (**self).version_field()
    }
}
