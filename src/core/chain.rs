//! core::chain
//!
//! Migration chain discovery and static verification.
//!
//! A migration chain is every `migrate_<N>` method on a type (or on the
//! migrator type it binds), ordered by `N`. Resolution is purely
//! introspective: nothing is invoked, and the same catalog always yields
//! the same chain or the same error.
//!
//! # Rules
//!
//! Checked in this order, first violation wins:
//!
//! 1. The lowest version is exactly 1
//! 2. Versions are consecutive
//! 3. Per step, in version order:
//!    - the first parameter is a document node type
//!    - there are exactly two parameters
//!    - the previous step's return type is assignable to the first parameter
//!    - the second parameter is the migration context
//!    - the return type is a document node type

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::catalog::{MethodDescriptor, TypeCatalog};
use super::context::StepFn;
use super::types::{SignatureType, TypeName};

static STEP_NAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^migrate_(\d+)$").ok());

/// Prefix shared by all migration step names.
pub const STEP_PREFIX: &str = "migrate_";

/// Parse the target version out of a step method name.
///
/// ```
/// use docmigrate::core::chain::step_version;
///
/// assert_eq!(step_version("migrate_12"), Some(12));
/// assert_eq!(step_version("migrate"), None);
/// assert_eq!(step_version("migrate_x"), None);
/// ```
pub fn step_version(name: &str) -> Option<u32> {
    let caps = STEP_NAME.as_ref()?.captures(name)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Step methods among `methods`, sorted by version.
pub fn step_methods(methods: &[MethodDescriptor]) -> Vec<(u32, &MethodDescriptor)> {
    let mut steps: Vec<_> = methods
        .iter()
        .filter_map(|m| step_version(&m.name).map(|v| (v, m)))
        .collect();
    steps.sort_by_key(|(v, _)| *v);
    steps
}

/// The signature a step to `version` is expected to have.
///
/// `input` is the previous step's return type, if any.
pub fn expected_signature(version: u32, input: Option<&SignatureType>) -> String {
    let input = input.unwrap_or(&SignatureType::Node);
    format!(
        "fn {STEP_PREFIX}{version}(data: {input}, context: {}) -> {}",
        SignatureType::Context,
        SignatureType::Node
    )
}

/// Which signature rule a step violates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureViolation {
    #[error("first parameter must be a document node type, found {found}")]
    FirstParameterNotNode { found: SignatureType },

    #[error("expected 2 parameters, found {found}")]
    ParameterCount { found: usize },

    #[error("first parameter {param} does not accept the previous step's return type {previous}")]
    NotChainedToPrevious {
        previous: SignatureType,
        param: SignatureType,
    },

    #[error("second parameter must be the migration context, found {found}")]
    SecondParameterNotContext { found: SignatureType },

    #[error("return type must be a document node type, found {found}")]
    ReturnNotNode { found: SignatureType },
}

/// Errors from chain resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("unknown type '{0}'")]
    UnknownType(TypeName),

    #[error("migrations of type '{declaring_type}' must start with 'migrate_1' (found '{method}')")]
    DoesNotStartAtOne {
        declaring_type: TypeName,
        method: String,
        version: u32,
    },

    #[error(
        "migrations of type '{declaring_type}' must be consecutive: '{method}' follows version {previous}"
    )]
    NonConsecutiveVersions {
        declaring_type: TypeName,
        method: String,
        version: u32,
        previous: u32,
    },

    #[error("migration method '{method}' should have the following signature:\n    {expected}\n({violation})")]
    InvalidStepSignature {
        declaring_type: TypeName,
        method: String,
        /// Expected signature text.
        expected: String,
        violation: SignatureViolation,
    },
}

/// One resolved migration step.
#[derive(Clone)]
pub struct MigrationStep {
    /// Version the document has after this step.
    pub to_version: u32,
    pub input: SignatureType,
    pub output: SignatureType,
    /// Full method name, `Host::migrate_N`.
    pub method: String,
    pub declaring_type: TypeName,
    /// Bound body, absent for signature-only catalogs.
    pub transform: Option<StepFn>,
}

impl MigrationStep {
    /// Version the document has before this step.
    pub fn from_version(&self) -> u32 {
        self.to_version - 1
    }
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("to_version", &self.to_version)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("method", &self.method)
            .field("bound", &self.transform.is_some())
            .finish()
    }
}

/// Validated, ordered migration steps for one type.
#[derive(Debug, Clone)]
pub struct MigrationChain {
    /// The migratable type.
    pub type_name: TypeName,
    /// The type hosting the steps (the bound migrator, or `type_name`).
    pub host: TypeName,
    pub steps: Vec<MigrationStep>,
}

impl MigrationChain {
    /// Highest version reachable, 0 for an empty chain.
    pub fn max_version(&self) -> u32 {
        self.steps.last().map_or(0, |s| s.to_version)
    }

    /// Steps still to run for a document at `version`.
    ///
    /// Versions are 1..=N, so the first `version` steps are already applied.
    pub fn pending(&self, version: u32) -> &[MigrationStep] {
        let done = usize::try_from(version)
            .unwrap_or(usize::MAX)
            .min(self.steps.len());
        &self.steps[done..]
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Resolves and statically verifies migration chains.
pub struct ChainResolver<'a> {
    catalog: &'a dyn TypeCatalog,
}

impl<'a> ChainResolver<'a> {
    pub fn new(catalog: &'a dyn TypeCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve the chain for `ty`, using its bound migrator when present.
    pub fn resolve(&self, ty: &TypeName) -> Result<MigrationChain, ChainError> {
        let desc = self
            .catalog
            .describe(ty)
            .ok_or_else(|| ChainError::UnknownType(ty.clone()))?;
        let host = desc
            .migration
            .as_ref()
            .and_then(|m| m.migrator.clone())
            .unwrap_or_else(|| ty.clone());
        let host_desc = self
            .catalog
            .describe(&host)
            .ok_or_else(|| ChainError::UnknownType(host.clone()))?;

        let methods = step_methods(&host_desc.methods);
        verify_numbering(&host, &methods)?;

        let mut steps = Vec::with_capacity(methods.len());
        let mut previous: Option<&SignatureType> = None;
        for (version, method) in methods {
            let (input, output) = verify_signature(&host, version, method, previous)?;
            steps.push(MigrationStep {
                to_version: version,
                input,
                output,
                method: full_name(&host, &method.name),
                declaring_type: host.clone(),
                transform: method.body.clone(),
            });
            previous = Some(&method.returns);
        }

        tracing::debug!(type_name = %ty, host = %host, steps = steps.len(), "resolved migration chain");
        Ok(MigrationChain {
            type_name: ty.clone(),
            host,
            steps,
        })
    }
}

fn full_name(host: &TypeName, method: &str) -> String {
    format!("{host}::{method}")
}

fn verify_numbering(host: &TypeName, methods: &[(u32, &MethodDescriptor)]) -> Result<(), ChainError> {
    let Some((first, first_method)) = methods.first() else {
        return Ok(());
    };
    if *first != 1 {
        return Err(ChainError::DoesNotStartAtOne {
            declaring_type: host.clone(),
            method: full_name(host, &first_method.name),
            version: *first,
        });
    }

    for pair in methods.windows(2) {
        let (previous, _) = pair[0];
        let (current, method) = pair[1];
        if previous.checked_add(1) != Some(current) {
            return Err(ChainError::NonConsecutiveVersions {
                declaring_type: host.clone(),
                method: full_name(host, &method.name),
                version: current,
                previous,
            });
        }
    }
    Ok(())
}

fn verify_signature(
    host: &TypeName,
    version: u32,
    method: &MethodDescriptor,
    previous: Option<&SignatureType>,
) -> Result<(SignatureType, SignatureType), ChainError> {
    let fail = |violation: SignatureViolation| ChainError::InvalidStepSignature {
        declaring_type: host.clone(),
        method: full_name(host, &method.name),
        expected: expected_signature(version, previous),
        violation,
    };

    let Some(data) = method.params.first() else {
        return Err(fail(SignatureViolation::ParameterCount { found: 0 }));
    };
    if !data.is_node() {
        return Err(fail(SignatureViolation::FirstParameterNotNode { found: data.clone() }));
    }
    if method.params.len() != 2 {
        return Err(fail(SignatureViolation::ParameterCount {
            found: method.params.len(),
        }));
    }
    if let Some(prev) = previous {
        if !prev.is_assignable_to(data) {
            return Err(fail(SignatureViolation::NotChainedToPrevious {
                previous: prev.clone(),
                param: data.clone(),
            }));
        }
    }
    let context = &method.params[1];
    if !SignatureType::Context.is_assignable_to(context) {
        return Err(fail(SignatureViolation::SecondParameterNotContext {
            found: context.clone(),
        }));
    }
    if !method.returns.is_node() {
        return Err(fail(SignatureViolation::ReturnNotNode {
            found: method.returns.clone(),
        }));
    }

    Ok((data.clone(), method.returns.clone()))
}
