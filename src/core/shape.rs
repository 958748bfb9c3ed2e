//! core::shape
//!
//! Structural type hashing.
//!
//! The canonical shape of a type is built depth-first from the catalog:
//!
//! - primitives hash as their name
//! - generic parameters of an open generic hash as the parameter name
//! - collections hash as `Name(argShape|argShape)`
//! - composites hash as `Name(memberShape-memberName|...)` with the member
//!   entries sorted as whole strings
//!
//! The root's own `Name(...)` wrapper is dropped, so a root composite's
//! shape is just its sorted member list. The fingerprint is the hex SHA-256
//! of that string.
//!
//! # Invariants
//!
//! - Reordering declared members never changes the shape
//! - Adding, removing, renaming or retyping an eligible member always does
//! - Each instantiated type is expanded at most once per call; a type seen
//!   earlier in the call (a cycle or a shared sub-type) hashes as its
//!   instantiated name. Members are visited in name order so the expanded
//!   occurrence does not depend on declaration order
//! - Version markers are never part of the shape
//!
//! # Example
//!
//! ```
//! use docmigrate::core::catalog::{TypeDescriptor, TypeRegistry};
//! use docmigrate::core::shape::ShapeHasher;
//! use docmigrate::core::types::TypeRef;
//!
//! let registry = TypeRegistry::with_builtins()
//!     .with(TypeDescriptor::composite("app::Address").unwrap()
//!         .member("Street", "String").unwrap()
//!         .member("Zip", "u32").unwrap())
//!     .unwrap();
//!
//! let hasher = ShapeHasher::new(&registry);
//! let shape = hasher.canonical_shape(&TypeRef::parse("app::Address").unwrap()).unwrap();
//! assert_eq!(shape, "String-Street|u32-Zip");
//! ```

use std::collections::HashSet;
use thiserror::Error;

use super::catalog::{MemberDescriptor, TypeCatalog, TypeDescriptor, TypeKind, Visibility};
use super::chain;
use super::types::{Fingerprint, TypeName, TypeRef};
use super::version::{LEGACY_VERSION_PROPERTY, VERSION_PROPERTY};

/// Errors from shape hashing and drift detection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("unknown type '{0}'")]
    UnknownType(TypeName),

    #[error("type '{type_name}' expects {expected} generic argument(s), found {found}")]
    GenericArity {
        type_name: TypeName,
        expected: usize,
        found: usize,
    },

    #[error(
        "type '{type_name}' has changed (recorded baseline on '{recorded_on}': {}).\n\
         If a migration is needed, add a step with the following signature:\n    \
         {}\n\
         To resolve this error, update the recorded baseline to '{computed}'.",
        describe_recorded(.recorded),
        next_signature(.next_version)
    )]
    SchemaDriftDetected {
        /// Type whose shape drifted.
        type_name: TypeName,
        /// Type carrying the recorded baseline.
        recorded_on: TypeName,
        recorded: Option<Fingerprint>,
        computed: Fingerprint,
        /// Version of the step to add if the change needs a migration.
        next_version: u32,
    },
}

fn describe_recorded(recorded: &Option<Fingerprint>) -> String {
    recorded
        .as_ref()
        .map_or_else(|| "none".to_string(), |fp| format!("'{fp}'"))
}

fn next_signature(next_version: &u32) -> String {
    chain::expected_signature(*next_version, None)
}

/// Which recorded baselines must match when a type binds a migrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineScope {
    /// The migratable type's own baseline.
    #[default]
    Declared,
    /// The bound migrator's baseline, falling back to the declared one
    /// when no migrator is bound.
    Migrator,
    /// Both.
    Both,
}

impl std::str::FromStr for BaselineScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "declared" => Ok(Self::Declared),
            "migrator" => Ok(Self::Migrator),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown baseline scope '{other}' (expected declared, migrator or both)"
            )),
        }
    }
}

/// Members that take part in a type's serialized shape.
///
/// With `explicit_members` only opted-in members count; otherwise every
/// public readable member does. Version markers never count.
pub fn eligible_members<'d>(
    desc: &'d TypeDescriptor,
    version_names: &'d [String],
) -> impl Iterator<Item = &'d MemberDescriptor> + 'd {
    desc.members.iter().filter(move |m| {
        let visible = if desc.explicit_members {
            m.serialized
        } else {
            m.visibility == Visibility::Public && m.readable
        };
        visible && !version_names.iter().any(|n| *n == m.name)
    })
}

/// Substitute generic parameters in `ty` with concrete arguments.
pub fn substitute(ty: &TypeRef, params: &[TypeName], args: &[TypeRef]) -> TypeRef {
    if ty.args().is_empty() {
        if let Some(i) = params.iter().position(|p| p == ty.name()) {
            if let Some(arg) = args.get(i) {
                return arg.clone();
            }
        }
        return ty.clone();
    }
    TypeRef::generic(
        ty.name().clone(),
        ty.args().iter().map(|a| substitute(a, params, args)).collect(),
    )
}

/// Computes canonical shapes and fingerprints from a catalog.
pub struct ShapeHasher<'a> {
    catalog: &'a dyn TypeCatalog,
    version_names: Vec<String>,
}

impl<'a> ShapeHasher<'a> {
    /// A hasher that excludes the default version marker names.
    pub fn new(catalog: &'a dyn TypeCatalog) -> Self {
        Self {
            catalog,
            version_names: vec![
                VERSION_PROPERTY.to_string(),
                LEGACY_VERSION_PROPERTY.to_string(),
            ],
        }
    }

    /// Exclude `names` as version markers instead of the defaults.
    pub fn with_version_names(mut self, names: Vec<String>) -> Self {
        self.version_names = names;
        self
    }

    /// The canonical shape string of `ty`.
    ///
    /// A generic root given without arguments is hashed open: its
    /// parameters appear as placeholders.
    pub fn canonical_shape(&self, ty: &TypeRef) -> Result<String, ShapeError> {
        let desc = self.describe(ty.name())?;
        let open = if ty.args().is_empty() {
            desc.generics.clone()
        } else {
            vec![]
        };

        let mut visited = HashSet::new();
        let shape = self.shape_of(ty, &open, &mut visited)?;

        let prefix = format!("{}(", ty.name());
        let stripped = shape
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(')'))
            .map(str::to_string);
        Ok(stripped.unwrap_or(shape))
    }

    /// The structural fingerprint of `ty`.
    pub fn fingerprint(&self, ty: &TypeRef) -> Result<Fingerprint, ShapeError> {
        let shape = self.canonical_shape(ty)?;
        let fp = Fingerprint::compute(&shape);
        tracing::trace!(type_name = %ty, fingerprint = %fp, "computed fingerprint");
        Ok(fp)
    }

    fn describe(&self, name: &TypeName) -> Result<&'a TypeDescriptor, ShapeError> {
        self.catalog
            .describe(name)
            .ok_or_else(|| ShapeError::UnknownType(name.clone()))
    }

    fn shape_of(
        &self,
        ty: &TypeRef,
        open: &[TypeName],
        visited: &mut HashSet<TypeRef>,
    ) -> Result<String, ShapeError> {
        if ty.args().is_empty() && open.contains(ty.name()) {
            return Ok(ty.name().to_string());
        }

        let desc = self.describe(ty.name())?;
        if desc.kind == TypeKind::Primitive {
            return Ok(desc.name.to_string());
        }

        let is_open_root = ty.args().is_empty() && open == desc.generics.as_slice();
        if !is_open_root && ty.args().len() != desc.generics.len() {
            return Err(ShapeError::GenericArity {
                type_name: desc.name.clone(),
                expected: desc.generics.len(),
                found: ty.args().len(),
            });
        }

        if !visited.insert(ty.clone()) {
            return Ok(ty.to_string());
        }

        let inner = match desc.kind {
            TypeKind::Collection => ty
                .args()
                .iter()
                .map(|arg| self.shape_of(arg, open, visited))
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                let mut members: Vec<_> = eligible_members(desc, &self.version_names).collect();
                members.sort_by(|a, b| a.name.cmp(&b.name));
                let mut entries = members
                    .into_iter()
                    .map(|m| {
                        let member_ty = substitute(&m.ty, &desc.generics, ty.args());
                        let member_shape = self.shape_of(&member_ty, open, visited)?;
                        Ok(format!("{member_shape}-{}", m.name))
                    })
                    .collect::<Result<Vec<_>, ShapeError>>()?;
                entries.sort();
                entries
            }
        };

        Ok(format!("{}({})", desc.name, inner.join("|")))
    }
}

/// Compare recorded baselines of a migratable type with its fresh fingerprint.
///
/// Returns `Ok(None)` for types that carry no migration metadata and the
/// fresh fingerprint when every baseline required by `scope` matches. A
/// missing baseline counts as drift. Members named in `version_names` are
/// version markers and stay out of the fingerprint.
pub fn check_baseline(
    catalog: &dyn TypeCatalog,
    ty: &TypeName,
    scope: BaselineScope,
    version_names: &[String],
) -> Result<Option<Fingerprint>, ShapeError> {
    let desc = catalog
        .describe(ty)
        .ok_or_else(|| ShapeError::UnknownType(ty.clone()))?;
    let Some(migration) = desc.migration.as_ref() else {
        return Ok(None);
    };

    let computed = ShapeHasher::new(catalog)
        .with_version_names(version_names.to_vec())
        .fingerprint(&TypeRef::named(ty.clone()))?;
    let host = migration.migrator.as_ref().unwrap_or(ty);
    let next_version = chain::step_methods(catalog.methods(host))
        .last()
        .map_or(1, |(v, _)| v.saturating_add(1));

    let mut carriers = Vec::new();
    match (scope, migration.migrator.as_ref()) {
        (BaselineScope::Declared, _) | (_, None) => carriers.push(ty),
        (BaselineScope::Migrator, Some(m)) => carriers.push(m),
        (BaselineScope::Both, Some(m)) => {
            carriers.push(ty);
            carriers.push(m);
        }
    }

    for carrier in carriers {
        let carrier_desc = catalog
            .describe(carrier)
            .ok_or_else(|| ShapeError::UnknownType(carrier.clone()))?;
        let recorded = carrier_desc
            .migration
            .as_ref()
            .and_then(|m| m.baseline.clone());
        if recorded.as_ref() != Some(&computed) {
            tracing::warn!(type_name = %ty, recorded_on = %carrier, computed = %computed, "schema drift detected");
            return Err(ShapeError::SchemaDriftDetected {
                type_name: ty.clone(),
                recorded_on: carrier.clone(),
                recorded,
                computed,
                next_version,
            });
        }
    }

    Ok(Some(computed))
}
