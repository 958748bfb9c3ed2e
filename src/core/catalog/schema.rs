//! core::catalog::schema
//!
//! Type descriptor schema.
//!
//! Descriptors are the static surface of a serializable type: its members,
//! its methods (migration steps among them), and its migration metadata.
//! They deserialize from catalog files and can be assembled in code with
//! the builder methods on [`TypeDescriptor`].
//!
//! # Example
//!
//! ```
//! use docmigrate::core::catalog::TypeDescriptor;
//! use docmigrate::core::types::SignatureType;
//!
//! let person = TypeDescriptor::composite("app::Person").unwrap()
//!     .member("Name", "String").unwrap()
//!     .member("Friends", "Vec<app::Person>").unwrap()
//!     .step(1, SignatureType::Object, SignatureType::Object, |doc, _ctx| Ok(doc))
//!     .migratable(None);
//!
//! assert_eq!(person.members.len(), 2);
//! assert!(person.migration.is_some());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::core::context::{MigrationContext, StepFn};
use crate::core::types::{Fingerprint, SignatureType, TypeError, TypeName, TypeRef};

/// How a type participates in shape hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Scalar type, hashed as its name.
    Primitive,
    /// Sequence or map type, hashed as `Name(arg|arg)`.
    Collection,
    /// Type with members.
    #[default]
    Composite,
}

/// Member visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

fn default_true() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A data member of a composite type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberDescriptor {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: TypeRef,

    #[serde(default)]
    pub visibility: Visibility,

    /// Whether the member has a readable accessor.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub readable: bool,

    /// Explicit opt-in to serialization.
    #[serde(default, skip_serializing_if = "is_false")]
    pub serialized: bool,
}

impl MemberDescriptor {
    /// A public, readable member.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            visibility: Visibility::Public,
            readable: true,
            serialized: false,
        }
    }
}

/// A method on a type.
///
/// Only the signature is described statically. A bound `body` makes the
/// method invocable as a migration step; catalogs loaded from files never
/// carry bodies.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodDescriptor {
    pub name: String,

    #[serde(default)]
    pub params: Vec<SignatureType>,

    pub returns: SignatureType,

    #[serde(skip)]
    pub body: Option<StepFn>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, params: Vec<SignatureType>, returns: SignatureType) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            body: None,
        }
    }

    /// Bind an invocable body to this method.
    pub fn with_body<F>(mut self, body: F) -> Self
    where
        F: Fn(Value, &MigrationContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("body", &self.body.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// The "migratable" marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationDescriptor {
    /// Recorded baseline fingerprint of the type's shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Fingerprint>,

    /// Alternate type hosting the migration steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrator: Option<TypeName>,
}

/// Static description of a type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDescriptor {
    pub name: TypeName,

    #[serde(default)]
    pub kind: TypeKind,

    /// Generic parameter names, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generics: Vec<TypeName>,

    /// Only members marked `serialized` are part of the shape.
    #[serde(default, skip_serializing_if = "is_false")]
    pub explicit_members: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationDescriptor>,
}

impl TypeDescriptor {
    fn bare(name: &str, kind: TypeKind) -> Result<Self, TypeError> {
        Ok(Self {
            name: TypeName::new(name)?,
            kind,
            generics: vec![],
            explicit_members: false,
            members: vec![],
            methods: vec![],
            migration: None,
        })
    }

    /// A primitive type.
    pub fn primitive(name: &str) -> Result<Self, TypeError> {
        Self::bare(name, TypeKind::Primitive)
    }

    /// A collection type with the given generic parameters.
    pub fn collection(name: &str, params: &[&str]) -> Result<Self, TypeError> {
        Self::bare(name, TypeKind::Collection)?.generic(params)
    }

    /// A composite type with no members yet.
    pub fn composite(name: &str) -> Result<Self, TypeError> {
        Self::bare(name, TypeKind::Composite)
    }

    /// Declare generic parameters.
    pub fn generic(mut self, params: &[&str]) -> Result<Self, TypeError> {
        self.generics = params
            .iter()
            .map(|p| TypeName::new(*p))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    /// Add a public, readable member.
    pub fn member(self, name: &str, ty: &str) -> Result<Self, TypeError> {
        Ok(self.with_member(MemberDescriptor::new(name, TypeRef::parse(ty)?)))
    }

    /// Add a member explicitly opted into serialization.
    pub fn serialized_member(self, name: &str, ty: &str) -> Result<Self, TypeError> {
        let mut member = MemberDescriptor::new(name, TypeRef::parse(ty)?);
        member.serialized = true;
        Ok(self.with_member(member))
    }

    /// Add a private member.
    pub fn private_member(self, name: &str, ty: &str) -> Result<Self, TypeError> {
        let mut member = MemberDescriptor::new(name, TypeRef::parse(ty)?);
        member.visibility = Visibility::Private;
        Ok(self.with_member(member))
    }

    pub fn with_member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Only members marked `serialized` are part of the shape.
    pub fn explicit_members(mut self) -> Self {
        self.explicit_members = true;
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Add migration step `migrate_<version>` with the conventional signature.
    pub fn step<F>(self, version: u32, input: SignatureType, output: SignatureType, body: F) -> Self
    where
        F: Fn(Value, &MigrationContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.method(
            MethodDescriptor::new(
                format!("migrate_{version}"),
                vec![input, SignatureType::Context],
                output,
            )
            .with_body(body),
        )
    }

    /// Mark the type migratable, recording its baseline fingerprint.
    pub fn migratable(mut self, baseline: Option<Fingerprint>) -> Self {
        self.migration.get_or_insert_with(Default::default).baseline = baseline;
        self
    }

    /// Bind an alternate type that hosts the migration steps.
    pub fn migrated_by(mut self, migrator: TypeName) -> Self {
        self.migration.get_or_insert_with(Default::default).migrator = Some(migrator);
        self
    }
}
