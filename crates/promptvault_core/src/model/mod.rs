//! Versioned prompt domain model.
//!
//! # Responsibility
//! - Define the version record, model outputs and label policy.
//! - Define the portable export document.
//!
//! # Invariants
//! - Model types are storage-agnostic; persistence lives in `storage`.

pub mod export;
pub mod version;
