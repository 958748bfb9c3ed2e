//! core::catalog
//!
//! The type-metadata collaborator.
//!
//! Everything docmigrate knows about a type comes through [`TypeCatalog`]:
//! members, methods and migration metadata. How a catalog is produced
//! (assembled in code, loaded from a file, generated by a build step) is
//! not the engine's concern.
//!
//! # Builtins
//!
//! [`TypeRegistry::with_builtins`] pre-registers the scalar primitives and
//! the standard collections so that user catalogs only describe their own
//! types.

mod schema;
pub mod store;

pub use schema::{
    MemberDescriptor, MethodDescriptor, MigrationDescriptor, TypeDescriptor, TypeKind, Visibility,
};

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

use super::types::{TypeError, TypeName};

/// Errors from building or loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("type '{0}' is already registered")]
    DuplicateType(TypeName),

    #[error("invalid descriptor for '{type_name}': {message}")]
    InvalidDescriptor { type_name: TypeName, message: String },

    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported catalog format: {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Read access to type descriptors.
pub trait TypeCatalog {
    /// Look up a type by name.
    fn describe(&self, name: &TypeName) -> Option<&TypeDescriptor>;

    /// Names of every described type, sorted.
    fn type_names(&self) -> Vec<TypeName>;

    /// Members of a type, empty if the type is unknown.
    fn members(&self, name: &TypeName) -> &[MemberDescriptor] {
        self.describe(name).map(|t| t.members.as_slice()).unwrap_or(&[])
    }

    /// Methods of a type, empty if the type is unknown.
    fn methods(&self, name: &TypeName) -> &[MethodDescriptor] {
        self.describe(name).map(|t| t.methods.as_slice()).unwrap_or(&[])
    }

    /// Migration metadata, if the type is migratable.
    fn migration(&self, name: &TypeName) -> Option<&MigrationDescriptor> {
        self.describe(name).and_then(|t| t.migration.as_ref())
    }
}

/// Characters that delimit member entries in a canonical shape.
const MEMBER_NAME_RESERVED: [char; 4] = ['(', ')', '|', '-'];

const BUILTIN_PRIMITIVES: &[&str] = &[
    "bool", "char", "String", "str", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16",
    "u32", "u64", "u128", "usize", "f32", "f64",
];

const BUILTIN_COLLECTIONS: &[(&str, &[&str])] = &[
    ("Vec", &["T"]),
    ("VecDeque", &["T"]),
    ("HashSet", &["T"]),
    ("BTreeSet", &["T"]),
    ("Option", &["T"]),
    ("HashMap", &["K", "V"]),
    ("BTreeMap", &["K", "V"]),
];

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<TypeName, TypeDescriptor>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-seeded with builtin primitives and collections.
    pub fn with_builtins() -> Self {
        let mut types = BTreeMap::new();
        let primitives = BUILTIN_PRIMITIVES
            .iter()
            .filter_map(|name| TypeDescriptor::primitive(name).ok());
        let collections = BUILTIN_COLLECTIONS
            .iter()
            .filter_map(|(name, params)| TypeDescriptor::collection(name, params).ok());
        for desc in primitives.chain(collections) {
            types.insert(desc.name.clone(), desc);
        }
        Self { types }
    }

    /// Register a descriptor.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken or the descriptor repeats a member,
    /// method or generic parameter name.
    pub fn register(&mut self, desc: TypeDescriptor) -> Result<(), CatalogError> {
        if self.types.contains_key(&desc.name) {
            return Err(CatalogError::DuplicateType(desc.name));
        }
        validate(&desc)?;
        tracing::trace!(type_name = %desc.name, "registered type");
        self.types.insert(desc.name.clone(), desc);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, desc: TypeDescriptor) -> Result<Self, CatalogError> {
        self.register(desc)?;
        Ok(self)
    }

    /// Number of registered types, builtins included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }
}

fn validate(desc: &TypeDescriptor) -> Result<(), CatalogError> {
    let invalid = |message: String| CatalogError::InvalidDescriptor {
        type_name: desc.name.clone(),
        message,
    };

    if let Some(dup) = first_duplicate(desc.generics.iter().map(|g| g.as_str())) {
        return Err(invalid(format!("generic parameter '{dup}' declared twice")));
    }
    for member in &desc.members {
        if member.name.is_empty() {
            return Err(invalid("member names cannot be empty".into()));
        }
        if let Some(c) = member.name.chars().find(|c| MEMBER_NAME_RESERVED.contains(c)) {
            return Err(invalid(format!("member name '{}' cannot contain '{c}'", member.name)));
        }
    }
    if let Some(dup) = first_duplicate(desc.members.iter().map(|m| m.name.as_str())) {
        return Err(invalid(format!("member '{dup}' declared twice")));
    }
    if let Some(dup) = first_duplicate(desc.methods.iter().map(|m| m.name.as_str())) {
        return Err(invalid(format!("method '{dup}' declared twice")));
    }
    if desc.kind == TypeKind::Collection && desc.generics.is_empty() {
        return Err(invalid("collection types need at least one generic parameter".into()));
    }
    Ok(())
}

fn first_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names.into_iter().find(|name| !seen.insert(*name))
}

impl TypeCatalog for TypeRegistry {
    fn describe(&self, name: &TypeName) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    fn type_names(&self) -> Vec<TypeName> {
        self.types.keys().cloned().collect()
    }
}
