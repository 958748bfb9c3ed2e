//! docmigrate - Versioned migrations for persisted JSON documents
//!
//! docmigrate keeps stored documents readable as the types they persist
//! evolve. Each migratable type records a structural fingerprint of its
//! serialized shape and declares an ordered chain of `migrate_N` steps.
//! Loading a document reads its version marker and runs the pending steps
//! before ordinary deserialization.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to core and engine)
//! - [`engine`] - Runtime migration: executor, nested migration, verification, loading
//! - [`core`] - Domain types, catalogs, shape hashing, chain resolution, config
//!
//! # Correctness Invariants
//!
//! 1. A shape change without a recorded fingerprint update is reported as drift
//! 2. Migration chains start at 1 and have no gaps
//! 3. Steps run in increasing version order, each exactly once per document
//! 4. Documents newer than the running build are rejected, never downgraded

pub mod cli;
pub mod core;
pub mod engine;
