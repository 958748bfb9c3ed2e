//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`TypeName`] - Validated fully-qualified type name
//! - [`TypeRef`] - A (possibly generic) reference to a type, e.g. `Vec<Person>`
//! - [`Fingerprint`] - Structural hash of a type's serializable shape
//! - [`SignatureType`] - Static type mentioned in a migration step signature
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use docmigrate::core::types::{TypeName, TypeRef};
//!
//! // Valid constructions
//! let name = TypeName::new("app::model::Person").unwrap();
//! let list = TypeRef::parse("Vec<app::model::Person>").unwrap();
//! assert_eq!(list.args()[0].name(), &name);
//!
//! // Invalid constructions fail at creation time
//! assert!(TypeName::new("has space").is_err());
//! assert!(TypeRef::parse("Vec<").is_err());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid type name: {0}")]
    InvalidTypeName(String),

    #[error("invalid type reference '{input}': {message}")]
    InvalidTypeRef { input: String, message: String },

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}

/// A validated, fully-qualified type name.
///
/// Type names are identities: two descriptors with the same name are the
/// same type. Names must:
/// - Not be empty
/// - Not contain whitespace or ASCII control characters
/// - Not contain any of `( ) | < > , -`, which are reserved by the
///   canonical shape syntax and the type reference syntax
///
/// # Example
///
/// ```
/// use docmigrate::core::types::TypeName;
///
/// let name = TypeName::new("app::Address").unwrap();
/// assert_eq!(name.as_str(), "app::Address");
///
/// assert!(TypeName::new("").is_err());
/// assert!(TypeName::new("Vec<T>").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeName(String);

impl TypeName {
    /// Characters reserved by the shape and type reference syntax.
    const RESERVED: [char; 7] = ['(', ')', '|', '<', '>', ',', '-'];

    /// Create a new validated type name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidTypeName` if the name is empty or contains
    /// reserved characters.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidTypeName(
                "type name cannot be empty".into(),
            ));
        }

        for c in name.chars() {
            if c.is_whitespace() || c.is_control() {
                return Err(TypeError::InvalidTypeName(format!(
                    "type name '{name}' cannot contain whitespace or control characters"
                )));
            }
            if Self::RESERVED.contains(&c) {
                return Err(TypeError::InvalidTypeName(format!(
                    "type name '{name}' cannot contain '{c}'"
                )));
            }
        }

        Ok(())
    }

    /// Get the type name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TypeName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for TypeName {
    type Error = TypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<TypeName> for String {
    fn from(name: TypeName) -> Self {
        name.0
    }
}

impl AsRef<str> for TypeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference to a type, optionally instantiated with generic arguments.
///
/// The string syntax is `Name` or `Name<Arg, Arg, ...>` and nests freely.
/// Inside a generic type's members, a bare name that equals one of the
/// declaring type's generic parameters refers to that parameter.
///
/// # Example
///
/// ```
/// use docmigrate::core::types::TypeRef;
///
/// let r = TypeRef::parse("HashMap<String, Vec<app::Person>>").unwrap();
/// assert_eq!(r.name().as_str(), "HashMap");
/// assert_eq!(r.args().len(), 2);
/// assert_eq!(r.to_string(), "HashMap<String, Vec<app::Person>>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeRef {
    name: TypeName,
    args: Vec<TypeRef>,
}

impl TypeRef {
    /// A reference to a non-generic type.
    pub fn named(name: TypeName) -> Self {
        Self { name, args: vec![] }
    }

    /// A reference to a generic type instantiated with `args`.
    pub fn generic(name: TypeName, args: Vec<TypeRef>) -> Self {
        Self { name, args }
    }

    /// Parse a type reference from its string syntax.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidTypeRef` on malformed syntax and
    /// `TypeError::InvalidTypeName` on invalid names.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let mut parser = RefParser { input, pos: 0 };
        let parsed = parser.parse_ref()?;
        parser.skip_ws();
        if parser.pos != input.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(parsed)
    }

    /// The referenced type's name (without arguments).
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    /// Generic arguments, empty for non-generic references.
    pub fn args(&self) -> &[TypeRef] {
        &self.args
    }
}

impl From<TypeName> for TypeRef {
    fn from(name: TypeName) -> Self {
        Self::named(name)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TypeRef> for String {
    fn from(r: TypeRef) -> Self {
        r.to_string()
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// Recursive-descent parser for the `Name<Arg, ...>` syntax.
struct RefParser<'a> {
    input: &'a str,
    pos: usize,
}

impl RefParser<'_> {
    fn parse_ref(&mut self) -> Result<TypeRef, TypeError> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '<' || c == '>' || c == ',' || c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
        if start == self.pos {
            return Err(self.error("expected a type name"));
        }
        let name = TypeName::new(&self.input[start..self.pos])?;

        self.skip_ws();
        if self.peek() != Some('<') {
            return Ok(TypeRef::named(name));
        }
        self.pos += 1;

        let mut args = Vec::new();
        loop {
            args.push(self.parse_ref()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.error("expected ',' or '>'")),
            }
        }

        Ok(TypeRef::generic(name, args))
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, message: &str) -> TypeError {
        TypeError::InvalidTypeRef {
            input: self.input.to_string(),
            message: format!("{message} at offset {}", self.pos),
        }
    }
}

/// A structural fingerprint: hex-encoded SHA-256 of a canonical shape.
///
/// Fingerprints are normalized to lowercase.
///
/// # Example
///
/// ```
/// use docmigrate::core::types::Fingerprint;
///
/// let fp = Fingerprint::compute("String-City|String-Street");
/// assert_eq!(fp.as_str().len(), 64);
///
/// // Same shape produces same fingerprint
/// assert_eq!(fp, Fingerprint::compute("String-City|String-Street"));
///
/// // Recorded baselines are parsed and validated
/// let recorded = Fingerprint::parse(&fp.as_str().to_uppercase()).unwrap();
/// assert_eq!(recorded, fp);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a canonical shape string.
    pub fn compute(shape: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(shape.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse a recorded fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidFingerprint` unless the input is 64 hex characters.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.trim().to_ascii_lowercase();
        if s.len() != 64 {
            return Err(TypeError::InvalidFingerprint(format!(
                "expected 64 hex characters, got {}",
                s.len()
            )));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidFingerprint(
                "fingerprint must be hexadecimal".into(),
            ));
        }
        Ok(Self(s))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A static type appearing in a migration step signature.
///
/// Document node types form a small hierarchy: `object`, `array` and
/// `scalar` are narrower than `node`. The serialization context and any
/// other named type are only assignable to themselves.
///
/// # Example
///
/// ```
/// use docmigrate::core::types::SignatureType;
///
/// assert!(SignatureType::Object.is_assignable_to(&SignatureType::Node));
/// assert!(!SignatureType::Node.is_assignable_to(&SignatureType::Object));
/// assert_eq!("context".parse::<SignatureType>().unwrap(), SignatureType::Context);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SignatureType {
    /// Any document node.
    Node,
    /// A composite node.
    Object,
    /// A sequence node.
    Array,
    /// A scalar node (string, number, bool, null).
    Scalar,
    /// The serialization-context capability.
    Context,
    /// Anything else.
    Named(TypeName),
}

impl SignatureType {
    /// Whether a value of this static type can be assigned to `target`.
    pub fn is_assignable_to(&self, target: &SignatureType) -> bool {
        match (self, target) {
            (
                SignatureType::Node
                | SignatureType::Object
                | SignatureType::Array
                | SignatureType::Scalar,
                SignatureType::Node,
            ) => true,
            (a, b) => a == b,
        }
    }

    /// Whether a runtime document node inhabits this static type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            SignatureType::Node => true,
            SignatureType::Object => value.is_object(),
            SignatureType::Array => value.is_array(),
            SignatureType::Scalar => !value.is_object() && !value.is_array(),
            SignatureType::Context | SignatureType::Named(_) => false,
        }
    }

    /// Whether this is one of the document node types.
    pub fn is_node(&self) -> bool {
        self.is_assignable_to(&SignatureType::Node)
    }
}

/// Describe the kind of a runtime document node.
pub fn node_kind(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        _ => "scalar",
    }
}

impl std::str::FromStr for SignatureType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "node" => SignatureType::Node,
            "object" => SignatureType::Object,
            "array" => SignatureType::Array,
            "scalar" => SignatureType::Scalar,
            "context" => SignatureType::Context,
            other => SignatureType::Named(TypeName::new(other)?),
        })
    }
}

impl TryFrom<String> for SignatureType {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SignatureType> for String {
    fn from(t: SignatureType) -> Self {
        t.to_string()
    }
}

impl std::fmt::Display for SignatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureType::Node => write!(f, "node"),
            SignatureType::Object => write!(f, "object"),
            SignatureType::Array => write!(f, "array"),
            SignatureType::Scalar => write!(f, "scalar"),
            SignatureType::Context => write!(f, "context"),
            SignatureType::Named(name) => write!(f, "{name}"),
        }
    }
}
