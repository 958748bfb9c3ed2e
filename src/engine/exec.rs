//! engine::exec
//!
//! The migration executor.
//!
//! # State Machine
//!
//! Over `(version, document)`, entered with the version read from the
//! document:
//!
//! - **NotMigratable**: the type has no migration metadata; the document
//!   is returned untouched
//! - **UpToDate**: `version == max`; nothing runs and nothing is written
//! - **Migrating**: `version < max`; run the step to `version + 1`, write
//!   the new version into the result, repeat
//! - **VersionTooHigh**: `version > max` on entry; fatal
//!
//! # Invariants
//!
//! - Steps run in increasing version order, each exactly once
//! - The version marker is rewritten after every step, since a step may
//!   replace the whole document
//! - The executor keeps no reference to the document after returning
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use docmigrate::core::catalog::{TypeDescriptor, TypeRegistry};
//! use docmigrate::core::types::{SignatureType, TypeRef};
//! use docmigrate::engine::{DataMigrator, MigrationError, Migrator};
//! use serde_json::json;
//!
//! let doc_type = TypeDescriptor::composite("app::Doc").unwrap()
//!     .step(1, SignatureType::Object, SignatureType::Object, |d, _| Ok(d))
//!     .migratable(None);
//! let migrator = Migrator::new(Arc::new(TypeRegistry::with_builtins().with(doc_type).unwrap()));
//!
//! let err = migrator
//!     .migrate(json!({"Version": 2}), &TypeRef::parse("app::Doc").unwrap())
//!     .unwrap_err();
//! assert!(matches!(err, MigrationError::DataVersionTooHigh { version: 2, supported: 1, .. }));
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::error::{MigrationError, StepPhase};
use super::{DataMigrator, Migrated};
use crate::core::catalog::TypeCatalog;
use crate::core::chain::{ChainResolver, MigrationChain, MigrationStep};
use crate::core::context::MigrationContext;
use crate::core::shape::{check_baseline, BaselineScope};
use crate::core::types::{node_kind, TypeName, TypeRef};
use crate::core::version::{JsonVersionField, VersionField};

/// Executor behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigratorOptions {
    /// Refuse to migrate types whose recorded baseline has drifted.
    pub check_baseline: Option<BaselineScope>,
}

/// Advances documents along their type's migration chain.
///
/// Resolved chains are cached per type for the migrator's lifetime.
pub struct Migrator {
    catalog: Arc<dyn TypeCatalog + Send + Sync>,
    version: Box<dyn VersionField>,
    options: MigratorOptions,
    chains: RwLock<HashMap<TypeName, Arc<MigrationChain>>>,
}

impl Migrator {
    /// A migrator using the default `Version` marker.
    pub fn new(catalog: Arc<dyn TypeCatalog + Send + Sync>) -> Self {
        Self {
            catalog,
            version: Box::new(JsonVersionField::default()),
            options: MigratorOptions::default(),
            chains: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_version_field(mut self, version: Box<dyn VersionField>) -> Self {
        self.version = version;
        self
    }

    pub fn with_options(mut self, options: MigratorOptions) -> Self {
        self.options = options;
        self
    }

    /// The resolved chain for `ty`.
    pub fn chain(&self, ty: &TypeName) -> Result<Arc<MigrationChain>, MigrationError> {
        if let Some(chain) = self
            .chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ty)
        {
            return Ok(Arc::clone(chain));
        }

        // Concurrent resolution of the same type is harmless; last write wins.
        let chain = Arc::new(ChainResolver::new(self.catalog()).resolve(ty)?);
        self.chains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ty.clone(), Arc::clone(&chain));
        Ok(chain)
    }

    /// The version freshly written documents of `ty` carry.
    pub fn current_version(&self, ty: &TypeName) -> Result<u32, MigrationError> {
        Ok(self.chain(ty)?.max_version())
    }

    fn run_step(
        &self,
        step: &MigrationStep,
        document: Value,
        ctx: &MigrationContext<'_>,
        type_name: &TypeName,
    ) -> Result<Value, MigrationError> {
        let Some(transform) = step.transform.as_ref() else {
            return Err(MigrationError::MissingMigrationStep {
                type_name: type_name.clone(),
                version: step.to_version,
                method: step.method.clone(),
            });
        };

        if !step.input.accepts(&document) {
            return Err(MigrationError::StepTypeMismatch {
                method: step.method.clone(),
                phase: StepPhase::Input,
                expected: step.input.clone(),
                found: node_kind(&document),
            });
        }

        let mut result = transform(document, ctx).map_err(|e| MigrationError::StepFailed {
            method: step.method.clone(),
            to_version: step.to_version,
            message: format!("{e:#}"),
        })?;

        if !step.output.accepts(&result) {
            return Err(MigrationError::StepTypeMismatch {
                method: step.method.clone(),
                phase: StepPhase::Output,
                expected: step.output.clone(),
                found: node_kind(&result),
            });
        }

        self.version.set_version(&mut result, step.to_version);
        tracing::debug!(
            type_name = %type_name,
            method = %step.method,
            from = step.from_version(),
            to = step.to_version,
            "applied migration step"
        );
        Ok(result)
    }
}

impl DataMigrator for Migrator {
    fn try_migrate(
        &self,
        document: Value,
        ty: &TypeRef,
        ctx: &MigrationContext<'_>,
    ) -> Result<Migrated, MigrationError> {
        if document.is_null() {
            return Err(MigrationError::InvalidArgument(format!(
                "document of type '{ty}' must not be null"
            )));
        }

        let type_name = ty.name();
        let desc = self
            .catalog
            .describe(type_name)
            .ok_or_else(|| MigrationError::UnknownType(type_name.clone()))?;
        if desc.migration.is_none() {
            tracing::trace!(type_name = %type_name, "type is not migratable");
            return Ok(Migrated::unchanged(document, 0));
        }

        if let Some(scope) = self.options.check_baseline {
            check_baseline(self.catalog(), type_name, scope, self.version.names())?;
        }

        let chain = self.chain(type_name)?;
        let version = self
            .version
            .get_version(&document)
            .map_err(|source| MigrationError::InvalidVersionMarker {
                type_name: type_name.clone(),
                source,
            })?;
        let max = chain.max_version();

        if version > max {
            return Err(MigrationError::DataVersionTooHigh {
                type_name: type_name.clone(),
                version,
                supported: max,
            });
        }
        if version == max {
            tracing::trace!(type_name = %type_name, version, "document is up to date");
            return Ok(Migrated::unchanged(document, version));
        }

        let mut document = document;
        for step in chain.pending(version) {
            document = self.run_step(step, document, ctx, type_name)?;
        }

        tracing::debug!(type_name = %type_name, from = version, to = max, "migrated document");
        Ok(Migrated {
            document,
            changed: true,
            from_version: version,
            to_version: max,
        })
    }

    fn catalog(&self) -> &dyn TypeCatalog {
        &*self.catalog
    }

    fn version_field(&self) -> &dyn VersionField {
        &*self.version
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("version", &self.version)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{MethodDescriptor, TypeDescriptor, TypeRegistry};
    use crate::core::shape::ShapeHasher;
    use crate::core::types::SignatureType::{Array, Context, Node, Object};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tref(s: &str) -> TypeRef {
        TypeRef::parse(s).unwrap()
    }

    fn append(suffix: &'static str) -> impl Fn(Value, &MigrationContext<'_>) -> anyhow::Result<Value> {
        move |mut doc, _| {
            let name = doc["Name"].as_str().unwrap_or_default().to_string();
            doc["Name"] = json!(format!("{name}{suffix}"));
            Ok(doc)
        }
    }

    fn migrator(ty: TypeDescriptor) -> Migrator {
        Migrator::new(Arc::new(TypeRegistry::with_builtins().with(ty).unwrap()))
    }

    fn three_steps() -> TypeDescriptor {
        TypeDescriptor::composite("app::Doc")
            .unwrap()
            .member("Name", "String")
            .unwrap()
            .step(1, Object, Object, append("_0"))
            .step(2, Object, Object, append("_1"))
            .step(3, Object, Object, append("_2"))
            .migratable(None)
    }

    mod states {
        use super::*;

        #[test]
        fn not_migratable_is_noop() {
            let plain = TypeDescriptor::composite("app::Doc")
                .unwrap()
                .step(1, Object, Object, |_, _| anyhow::bail!("must not run"));
            let m = migrator(plain);
            let doc = json!({"Version": 7, "x": 1});
            let result = m.migrate(doc.clone(), &tref("app::Doc")).unwrap();
            assert_eq!(result, Migrated::unchanged(doc, 0));
        }

        #[test]
        fn up_to_date_runs_nothing() {
            let m = migrator(three_steps());
            let doc = json!({"Name": "x", "<>Version": 3});
            let result = m.migrate(doc.clone(), &tref("app::Doc")).unwrap();
            assert!(!result.changed);
            assert_eq!(result.document, doc);
            assert_eq!(result.to_version, 3);
        }

        #[test]
        fn migrates_from_every_version() {
            let m = migrator(three_steps());
            let cases = [
                (json!({}), "_0_1_2", 0),
                (json!({"Name": "a", "Version": 1}), "a_1_2", 1),
                (json!({"Name": "b", "Version": 2}), "b_2", 2),
            ];
            for (doc, expected, from) in cases {
                let result = m.migrate(doc, &tref("app::Doc")).unwrap();
                assert_eq!(result.document["Name"], json!(expected));
                assert_eq!(result.document["Version"], json!(3));
                assert_eq!((result.from_version, result.to_version), (from, 3));
                assert!(result.changed);
            }
        }

        #[test]
        fn too_high_is_fatal() {
            let m = migrator(three_steps());
            let err = m
                .migrate(json!({"Version": 4}), &tref("app::Doc"))
                .unwrap_err();
            assert!(matches!(
                err,
                MigrationError::DataVersionTooHigh { version: 4, supported: 3, .. }
            ));
        }

        #[test]
        fn empty_chain_accepts_only_version_zero() {
            let m = migrator(TypeDescriptor::composite("app::Doc").unwrap().migratable(None));
            assert!(!m.migrate(json!({}), &tref("app::Doc")).unwrap().changed);
            assert!(m.migrate(json!({"Version": 1}), &tref("app::Doc")).is_err());
        }
    }

    mod arguments {
        use super::*;

        #[test]
        fn null_document_rejected() {
            let m = migrator(three_steps());
            let err = m.migrate(Value::Null, &tref("app::Doc")).unwrap_err();
            assert!(matches!(err, MigrationError::InvalidArgument(_)));
        }

        #[test]
        fn unknown_type_rejected() {
            let m = migrator(three_steps());
            let err = m.migrate(json!({}), &tref("app::Other")).unwrap_err();
            assert!(matches!(err, MigrationError::UnknownType(_)));
        }

        #[test]
        fn invalid_marker_rejected() {
            let m = migrator(three_steps());
            let err = m
                .migrate(json!({"Version": "2"}), &tref("app::Doc"))
                .unwrap_err();
            assert!(matches!(err, MigrationError::InvalidVersionMarker { .. }));
        }
    }

    mod steps {
        use super::*;

        #[test]
        fn each_step_runs_once_in_order() {
            let calls = Arc::new(AtomicUsize::new(0));
            let mut ty = TypeDescriptor::composite("app::Doc").unwrap().migratable(None);
            for v in 1..=4u32 {
                let calls = Arc::clone(&calls);
                ty = ty.step(v, Object, Object, move |doc, _| {
                    let seen = calls.fetch_add(1, Ordering::SeqCst) as u32;
                    anyhow::ensure!(seen + 1 == v, "step {v} ran out of order");
                    Ok(doc)
                });
            }
            let m = migrator(ty);
            m.migrate(json!({"Version": 1}), &tref("app::Doc")).unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }

        #[test]
        fn array_replaced_by_object() {
            let ty = TypeDescriptor::composite("app::Doc")
                .unwrap()
                .step(1, Array, Object, |doc, _| Ok(json!({ "Items": doc })));
            let m = migrator(ty.migratable(None));
            let result = m.migrate(json!([1, 2]), &tref("app::Doc")).unwrap();
            assert_eq!(result.document, json!({"Items": [1, 2], "Version": 1}));
        }

        #[test]
        fn input_kind_checked() {
            let ty = TypeDescriptor::composite("app::Doc")
                .unwrap()
                .step(1, Object, Object, |d, _| Ok(d))
                .migratable(None);
            let err = migrator(ty).migrate(json!([1]), &tref("app::Doc")).unwrap_err();
            assert!(matches!(
                err,
                MigrationError::StepTypeMismatch { phase: StepPhase::Input, found: "array", .. }
            ));
        }

        #[test]
        fn output_kind_checked() {
            let ty = TypeDescriptor::composite("app::Doc")
                .unwrap()
                .step(1, Node, Object, |_, _| Ok(json!("oops")))
                .migratable(None);
            let err = migrator(ty).migrate(json!({}), &tref("app::Doc")).unwrap_err();
            assert!(matches!(
                err,
                MigrationError::StepTypeMismatch { phase: StepPhase::Output, found: "scalar", .. }
            ));
        }

        #[test]
        fn failures_surface_with_method_name() {
            let ty = TypeDescriptor::composite("app::Doc")
                .unwrap()
                .step(1, Object, Object, |_, _| anyhow::bail!("bad data"))
                .migratable(None);
            let err = migrator(ty).migrate(json!({}), &tref("app::Doc")).unwrap_err();
            assert_eq!(
                err.to_string(),
                "migration step 'app::Doc::migrate_1' to version 1 failed: bad data"
            );
        }

        #[test]
        fn unbound_step_is_missing() {
            let ty = TypeDescriptor::composite("app::Doc")
                .unwrap()
                .method(MethodDescriptor::new("migrate_1", vec![Object, Context], Object))
                .migratable(None);
            let err = migrator(ty).migrate(json!({}), &tref("app::Doc")).unwrap_err();
            assert!(matches!(
                err,
                MigrationError::MissingMigrationStep { version: 1, .. }
            ));
        }

        #[test]
        fn steps_see_the_catalog() {
            let ty = TypeDescriptor::composite("app::Doc")
                .unwrap()
                .step(1, Object, Object, |mut doc, ctx| {
                    let known = ctx.catalog().describe(&TypeName::new("String")?).is_some();
                    doc["KnowsString"] = json!(known);
                    Ok(doc)
                })
                .migratable(None);
            let result = migrator(ty).migrate(json!({}), &tref("app::Doc")).unwrap();
            assert_eq!(result.document["KnowsString"], json!(true));
        }
    }

    mod chain_and_options {
        use super::*;

        #[test]
        fn broken_chain_surfaces() {
            let ty = TypeDescriptor::composite("app::Doc")
                .unwrap()
                .step(2, Object, Object, |d, _| Ok(d))
                .migratable(None);
            let err = migrator(ty).migrate(json!({}), &tref("app::Doc")).unwrap_err();
            assert!(matches!(err, MigrationError::Chain(_)));
        }

        #[test]
        fn chains_are_cached() {
            let m = migrator(three_steps());
            let name = TypeName::new("app::Doc").unwrap();
            let first = m.chain(&name).unwrap();
            let second = m.chain(&name).unwrap();
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(m.current_version(&name).unwrap(), 3);
        }

        #[test]
        fn baseline_check_blocks_drifted_types() {
            let m = migrator(three_steps())
                .with_options(MigratorOptions { check_baseline: Some(BaselineScope::Declared) });
            let err = m.migrate(json!({}), &tref("app::Doc")).unwrap_err();
            assert!(matches!(err, MigrationError::Shape(_)));
        }

        #[test]
        fn baseline_check_passes_when_recorded() {
            let reg = TypeRegistry::with_builtins().with(three_steps()).unwrap();
            let fp = ShapeHasher::new(&reg).fingerprint(&tref("app::Doc")).unwrap();
            let m = migrator(three_steps().migratable(Some(fp)))
                .with_options(MigratorOptions { check_baseline: Some(BaselineScope::Declared) });
            assert!(m.migrate(json!({}), &tref("app::Doc")).is_ok());
        }

        #[test]
        fn baseline_check_uses_configured_marker() {
            let doc = three_steps()
                .member("Version", "String")
                .unwrap()
                .member("schema", "u32")
                .unwrap();
            let reg = TypeRegistry::with_builtins().with(doc.clone()).unwrap();
            let fp = ShapeHasher::new(&reg)
                .with_version_names(vec!["schema".into()])
                .fingerprint(&tref("app::Doc"))
                .unwrap();
            let m = migrator(doc.migratable(Some(fp)))
                .with_version_field(Box::new(JsonVersionField::new("schema", Vec::<String>::new())))
                .with_options(MigratorOptions { check_baseline: Some(BaselineScope::Declared) });

            let result = m.migrate(json!({"Name": "n", "schema": 2}), &tref("app::Doc")).unwrap();
            assert_eq!(result.document["schema"], json!(3));
        }

        #[test]
        fn custom_version_field() {
            let m = migrator(three_steps()).with_version_field(Box::new(JsonVersionField::new(
                "schema",
                Vec::<String>::new(),
            )));
            let result = m.migrate(json!({"Name": "n", "schema": 2}), &tref("app::Doc")).unwrap();
            assert_eq!(result.document, json!({"Name": "n_2", "schema": 3}));
            assert_eq!(m.version_field().names(), ["schema"]);
        }

        #[test]
        fn migrated_by_host() {
            let domain = TypeDescriptor::composite("app::Doc")
                .unwrap()
                .migratable(None)
                .migrated_by(TypeName::new("app::DocMigrator").unwrap());
            let host = TypeDescriptor::composite("app::DocMigrator")
                .unwrap()
                .step(1, Object, Object, append("_A"))
                .step(2, Object, Object, append("_B"));
            let registry = TypeRegistry::with_builtins().with(domain).unwrap().with(host).unwrap();
            let m = Migrator::new(Arc::new(registry));
            let result = m.migrate(json!({"Name": "Name"}), &tref("app::Doc")).unwrap();
            assert_eq!(result.document["Name"], json!("Name_A_B"));
        }
    }
}
