//! core
//!
//! Core domain types and pure operations for docmigrate.
//!
//! # Modules
//!
//! - [`types`] - Strong types: TypeName, TypeRef, Fingerprint, SignatureType
//! - [`catalog`] - Type descriptors, the catalog trait and file-backed registries
//! - [`shape`] - Canonical shapes, fingerprints and baseline drift checks
//! - [`chain`] - Migration step discovery and chain verification
//! - [`version`] - The version marker protocol
//! - [`context`] - The context handed to migration steps
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid type references at construction
//! - Schemas are strict and self-describing
//! - Hashing and chain verification are deterministic and side-effect free

pub mod catalog;
pub mod chain;
pub mod config;
pub mod context;
pub mod shape;
pub mod types;
pub mod version;
