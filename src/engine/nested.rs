//! engine::nested
//!
//! Migration of documents nested inside other documents.
//!
//! [`NestedMigrator`] migrates the outer document first, then walks the
//! result using the declared type's members. Each member slot is migrated
//! against the member's declared type, with generic parameters of the
//! outer type substituted by its arguments. Collections are walked by
//! shape:
//!
//! - a sequence migrates each element against the first argument
//! - a map (two arguments) migrates each value against the second
//! - `Option<T>`, or any other single-argument collection holding a
//!   non-sequence value, migrates the value itself against the argument
//!
//! `null` slots are left alone.

use serde_json::Value;

use super::error::MigrationError;
use super::{DataMigrator, Migrated};
use crate::core::catalog::{TypeCatalog, TypeKind};
use crate::core::context::MigrationContext;
use crate::core::shape::{eligible_members, substitute};
use crate::core::types::TypeRef;
use crate::core::version::VersionField;

const OPTION: &str = "Option";

/// A migrator that also migrates nested documents.
#[derive(Debug)]
pub struct NestedMigrator<M> {
    inner: M,
}

impl<M: DataMigrator> NestedMigrator<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    fn migrate_slot(
        &self,
        slot: &mut Value,
        ty: &TypeRef,
        ctx: &MigrationContext<'_>,
    ) -> Result<bool, MigrationError> {
        if slot.is_null() {
            return Ok(false);
        }
        let migrated = self.try_migrate(std::mem::take(slot), ty, ctx)?;
        *slot = migrated.document;
        Ok(migrated.changed)
    }

    fn migrate_children(
        &self,
        document: &mut Value,
        ty: &TypeRef,
        ctx: &MigrationContext<'_>,
    ) -> Result<bool, MigrationError> {
        let desc = ctx
            .catalog()
            .describe(ty.name())
            .ok_or_else(|| MigrationError::UnknownType(ty.name().clone()))?;

        let mut changed = false;
        match (desc.kind, document) {
            (TypeKind::Primitive, _) => {}
            (TypeKind::Composite, Value::Object(fields)) => {
                let version_names = self.inner.version_field().names();
                for member in eligible_members(desc, version_names) {
                    let Some(slot) = fields.get_mut(&member.name) else {
                        continue;
                    };
                    let member_ty = substitute(&member.ty, &desc.generics, ty.args());
                    changed |= self.migrate_slot(slot, &member_ty, ctx)?;
                }
            }
            (TypeKind::Composite, _) => {}
            (TypeKind::Collection, value) if ty.name().as_str() == OPTION => {
                if let [inner] = ty.args() {
                    changed |= self.migrate_slot(value, inner, ctx)?;
                }
            }
            (TypeKind::Collection, Value::Array(items)) => {
                if let Some(element) = ty.args().first() {
                    for item in items.iter_mut() {
                        changed |= self.migrate_slot(item, element, ctx)?;
                    }
                }
            }
            (TypeKind::Collection, Value::Object(entries)) if ty.args().len() == 2 => {
                let value_ty = &ty.args()[1];
                for value in entries.values_mut() {
                    changed |= self.migrate_slot(value, value_ty, ctx)?;
                }
            }
            (TypeKind::Collection, value) => {
                if let [inner] = ty.args() {
                    changed |= self.migrate_slot(value, inner, ctx)?;
                }
            }
        }
        Ok(changed)
    }
}

impl<M: DataMigrator> DataMigrator for NestedMigrator<M> {
    fn try_migrate(
        &self,
        document: Value,
        ty: &TypeRef,
        ctx: &MigrationContext<'_>,
    ) -> Result<Migrated, MigrationError> {
        let mut migrated = self.inner.try_migrate(document, ty, ctx)?;
        if self.migrate_children(&mut migrated.document, ty, ctx)? {
            tracing::trace!(type_name = %ty, "migrated nested documents");
            migrated.changed = true;
        }
        Ok(migrated)
    }

    fn catalog(&self) -> &dyn TypeCatalog {
        self.inner.catalog()
    }

    fn version_field(&self) -> &dyn VersionField {
        self.inner.version_field()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{TypeDescriptor, TypeRegistry};
    use crate::core::types::SignatureType::Object;
    use crate::engine::exec::Migrator;
    use serde_json::json;
    use std::sync::Arc;

    fn tref(s: &str) -> TypeRef {
        TypeRef::parse(s).unwrap()
    }

    fn registry() -> TypeRegistry {
        let address = TypeDescriptor::composite("app::Address")
            .unwrap()
            .member("City", "String")
            .unwrap()
            .step(1, Object, Object, |mut doc, _| {
                let town = doc["Town"].take();
                doc["City"] = town;
                if let Some(fields) = doc.as_object_mut() {
                    fields.remove("Town");
                }
                Ok(doc)
            })
            .migratable(None);
        let person = TypeDescriptor::composite("app::Person")
            .unwrap()
            .member("Home", "app::Address")
            .unwrap()
            .member("Past", "Vec<app::Address>")
            .unwrap()
            .member("ByName", "HashMap<String, app::Address>")
            .unwrap()
            .member("Work", "Option<app::Address>")
            .unwrap()
            .member("Trips", "Option<Vec<app::Address>>")
            .unwrap();
        let boxed = TypeDescriptor::composite("app::Boxed")
            .unwrap()
            .generic(&["T"])
            .unwrap()
            .member("Value", "T")
            .unwrap();
        TypeRegistry::with_builtins()
            .with(address)
            .unwrap()
            .with(person)
            .unwrap()
            .with(boxed)
            .unwrap()
    }

    fn nested() -> NestedMigrator<Migrator> {
        NestedMigrator::new(Migrator::new(Arc::new(registry())))
    }

    #[test]
    fn members_and_collections_migrated() {
        let doc = json!({
            "Home": {"Town": "Oslo"},
            "Past": [{"Town": "Rome"}, {"City": "Lima", "Version": 1}],
            "ByName": {"office": {"Town": "Bern"}},
            "Work": {"Town": "Kyiv"},
            "Trips": [{"Town": "Oslo"}],
        });
        let result = nested().migrate(doc, &tref("app::Person")).unwrap();
        assert!(result.changed);
        assert_eq!(result.to_version, 0);
        assert_eq!(
            result.document,
            json!({
                "Home": {"City": "Oslo", "Version": 1},
                "Past": [{"City": "Rome", "Version": 1}, {"City": "Lima", "Version": 1}],
                "ByName": {"office": {"City": "Bern", "Version": 1}},
                "Work": {"City": "Kyiv", "Version": 1},
                "Trips": [{"City": "Oslo", "Version": 1}],
            })
        );
    }

    #[test]
    fn null_and_absent_slots_untouched() {
        let doc = json!({"Home": null, "Work": null});
        let result = nested().migrate(doc.clone(), &tref("app::Person")).unwrap();
        assert!(!result.changed);
        assert_eq!(result.document, doc);
    }

    #[test]
    fn generic_members_substituted() {
        let doc = json!({"Value": {"Town": "Oslo"}});
        let result = nested()
            .migrate(doc, &tref("app::Boxed<app::Address>"))
            .unwrap();
        assert_eq!(result.document["Value"], json!({"City": "Oslo", "Version": 1}));
    }

    #[test]
    fn top_level_collections_walked() {
        let doc = json!([{"Town": "Oslo"}]);
        let result = nested().migrate(doc, &tref("Vec<app::Address>")).unwrap();
        assert_eq!(result.document, json!([{"City": "Oslo", "Version": 1}]));
    }

    #[test]
    fn unknown_member_type_fails() {
        let odd = TypeDescriptor::composite("app::Odd")
            .unwrap()
            .member("Ghost", "app::Missing")
            .unwrap();
        let registry = TypeRegistry::with_builtins().with(odd).unwrap();
        let m = NestedMigrator::new(Migrator::new(Arc::new(registry)));
        let err = m.migrate(json!({"Ghost": {}}), &tref("app::Odd")).unwrap_err();
        assert!(matches!(err, MigrationError::UnknownType(_)));
    }
}
