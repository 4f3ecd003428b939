//! Prompt aggregates and the manager facade.
//!
//! # Responsibility
//! - Own version-history semantics above the storage contract.
//! - Keep callers decoupled from storage layout details.
//!
//! # Invariants
//! - Services never bypass `StorageBackend`; all durable effects go through it.

pub mod manager;
pub mod path;
pub mod project;
pub mod prompt;
