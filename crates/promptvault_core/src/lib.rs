//! Versioned prompt storage.
//!
//! Prompts live in projects; every prompt keeps an ordered history of
//! versions, each with content, per-model outputs and metadata. Histories are
//! persisted through a pluggable [`StorageBackend`] and can be exported to and
//! imported from a portable JSON document.

pub mod config;
pub mod logging;
pub mod model;
pub mod service;
pub mod storage;

pub use config::VaultConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::export::{ExportFormatError, PromptExport};
pub use model::version::{
    is_valid_version_label, next_version, normalize_outputs, validate_version_label, Meta,
    ModelOutput, OutputValue, PromptVersion, VersionLabelError, FIRST_VERSION_LABEL,
};
pub use service::manager::PromptManager;
pub use service::path::{IntoPromptPath, PromptPath};
pub use service::project::Project;
pub use service::prompt::{
    ImportFormatError, Prompt, PromptError, PromptResult, SaveReport, VersionUpdate,
};
pub use storage::{FsStorageBackend, StorageBackend, StorageError, StorageResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
