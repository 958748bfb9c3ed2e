//! core::context
//!
//! The serialization context handed to every migration step.
//!
//! A [`MigrationContext`] lives for one migration call path. It gives steps
//! read access to the catalog and carries the re-entrancy guard used by the
//! verifying migrator, so nothing about a migration is process-global.

use serde_json::Value;
use std::cell::RefCell;
use std::sync::Arc;

use super::catalog::TypeCatalog;
use super::types::TypeName;

/// An invocable migration step body.
pub type StepFn =
    Arc<dyn Fn(Value, &MigrationContext<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// Call-scoped state shared by the steps of one migration.
pub struct MigrationContext<'a> {
    catalog: &'a dyn TypeCatalog,
    verifying: RefCell<Vec<TypeName>>,
}

impl<'a> MigrationContext<'a> {
    pub fn new(catalog: &'a dyn TypeCatalog) -> Self {
        Self {
            catalog,
            verifying: RefCell::new(Vec::new()),
        }
    }

    /// The catalog this migration runs against.
    pub fn catalog(&self) -> &'a dyn TypeCatalog {
        self.catalog
    }

    /// Whether verification of `ty` is in progress on this call path.
    pub fn is_verifying(&self, ty: &TypeName) -> bool {
        self.verifying.borrow().contains(ty)
    }

    /// Mark `ty` as being verified until the guard drops.
    ///
    /// Returns `None` when `ty` is already being verified further up the
    /// call path.
    pub fn enter_verification(&self, ty: &TypeName) -> Option<VerificationGuard<'_>> {
        if self.is_verifying(ty) {
            return None;
        }
        self.verifying.borrow_mut().push(ty.clone());
        Some(VerificationGuard {
            stack: &self.verifying,
        })
    }
}

impl std::fmt::Debug for MigrationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationContext")
            .field("verifying", &self.verifying.borrow())
            .finish_non_exhaustive()
    }
}

/// Pops the verification marker on drop.
#[must_use]
pub struct VerificationGuard<'c> {
    stack: &'c RefCell<Vec<TypeName>>,
}

impl Drop for VerificationGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::TypeRegistry;

    #[test]
    fn guard_blocks_reentry_until_dropped() {
        let registry = TypeRegistry::new();
        let ctx = MigrationContext::new(&registry);
        let ty = TypeName::new("app::A").unwrap();

        let guard = ctx.enter_verification(&ty);
        assert!(guard.is_some());
        assert!(ctx.is_verifying(&ty));
        assert!(ctx.enter_verification(&ty).is_none());

        drop(guard);
        assert!(!ctx.is_verifying(&ty));
        assert!(ctx.enter_verification(&ty).is_some());
    }

    #[test]
    fn guards_are_per_type() {
        let registry = TypeRegistry::new();
        let ctx = MigrationContext::new(&registry);
        let a = TypeName::new("app::A").unwrap();
        let b = TypeName::new("app::B").unwrap();

        let _outer = ctx.enter_verification(&a).unwrap();
        let inner = ctx.enter_verification(&b);
        assert!(inner.is_some());
    }

    #[test]
    fn independent_contexts_do_not_interfere() {
        let registry = TypeRegistry::new();
        let first = MigrationContext::new(&registry);
        let second = MigrationContext::new(&registry);
        let ty = TypeName::new("app::A").unwrap();

        let _guard = first.enter_verification(&ty).unwrap();
        assert!(!second.is_verifying(&ty));
    }
}
