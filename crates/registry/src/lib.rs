//! Work Registry for Unique Song Ownership Records
//!
//! This crate owns the registry state machine: it fingerprints each work's
//! `(title, creator)` pair, rejects duplicates, allocates strictly increasing
//! identifiers, and answers point lookups. Durability comes from a
//! [`cantus_storage::RegistryStore`]; identity, metadata storage, and the
//! clock are injected collaborators.

pub mod errors;
pub mod registry;

pub use errors::*;
pub use registry::WorkRegistry;
