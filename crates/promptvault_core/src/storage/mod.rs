//! Storage backend contract and implementations.
//!
//! # Responsibility
//! - Define the capability interface used by prompt aggregates.
//! - Keep filesystem layout details out of service code.
//!
//! # Invariants
//! - Missing root namespace lists as empty, never as an error.
//! - Reads skip incomplete version records instead of failing.
//! - Deleting an absent version is a no-op.
//! - A label directory that also holds a nested prompt is never removed or
//!   replaced.
//! - Project/prompt names and version labels are validated before any path
//!   is built from them.

use crate::model::version::{validate_version_label, PromptVersion, VersionLabelError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod fs_backend;

pub use fs_backend::FsStorageBackend;

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from storage backend operations.
#[derive(Debug)]
pub enum StorageError {
    /// Project namespace does not exist.
    ProjectNotFound(String),
    /// Prompt namespace does not exist.
    PromptNotFound { project: String, prompt: String },
    /// Non-overwriting save targeted an occupied version record.
    VersionDirExists(PathBuf),
    /// The label directory also holds a nested prompt and cannot be replaced.
    NamespaceConflict(PathBuf),
    /// Name or label cannot be used as a namespace segment.
    InvalidName { kind: &'static str, value: String },
    /// Underlying I/O failure.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Persisted structured record is malformed.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectNotFound(project) => write!(f, "project not found: {project}"),
            Self::PromptNotFound { project, prompt } => {
                write!(f, "prompt not found: {project}/{prompt}")
            }
            Self::VersionDirExists(path) => {
                write!(f, "version already exists: {}", path.display())
            }
            Self::NamespaceConflict(path) => {
                write!(f, "version directory holds a nested prompt: {}", path.display())
            }
            Self::InvalidName { kind, value } => write!(f, "invalid {kind} name `{value}`"),
            Self::Io { path, source } => write!(f, "io error at {}: {source}", path.display()),
            Self::Json { path, source } => {
                write!(f, "malformed record at {}: {source}", path.display())
            }
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Persistence capability for prompt version histories.
///
/// Implementations are single-writer; no locking is implied.
pub trait StorageBackend {
    /// Lists project names; empty when nothing was stored yet.
    fn list_projects(&self) -> StorageResult<Vec<String>>;
    /// Lists prompt names of one project.
    fn list_prompts(&self, project: &str) -> StorageResult<Vec<String>>;
    fn exists_prompt(&self, project: &str, prompt: &str) -> StorageResult<bool>;
    /// Loads every complete version, ordered by label.
    fn load_versions(&self, project: &str, prompt: &str) -> StorageResult<Vec<PromptVersion>>;
    /// Writes one version; fails when it exists and `overwrite` is false.
    fn save_version(
        &self,
        project: &str,
        prompt: &str,
        version: &PromptVersion,
        overwrite: bool,
    ) -> StorageResult<()>;
    /// Removes one version; absent versions are a no-op. Nested prompts
    /// sharing the label's directory are left intact.
    fn delete_version(&self, project: &str, prompt: &str, label: &str) -> StorageResult<()>;
    fn mkdir_project(&self, project: &str) -> StorageResult<()>;
    fn mkdir_prompt(&self, project: &str, prompt: &str) -> StorageResult<()>;

    /// Labels of complete versions currently persisted.
    fn list_versions(&self, project: &str, prompt: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .load_versions(project, prompt)?
            .into_iter()
            .map(|version| version.version)
            .collect())
    }
}

/// Validates a project name: one non-empty segment, not `.`/`..`.
pub(crate) fn check_project_name(project: &str) -> StorageResult<()> {
    if is_safe_segment(project) {
        Ok(())
    } else {
        Err(StorageError::InvalidName {
            kind: "project",
            value: project.to_string(),
        })
    }
}

/// Validates a prompt name: one or more `/`-separated safe segments.
pub(crate) fn check_prompt_name(prompt: &str) -> StorageResult<()> {
    if is_safe_prompt_name(prompt) {
        Ok(())
    } else {
        Err(StorageError::InvalidName {
            kind: "prompt",
            value: prompt.to_string(),
        })
    }
}

pub(crate) fn check_version_label(label: &str) -> StorageResult<()> {
    validate_version_label(label).map_err(|err| StorageError::InvalidName {
        kind: "version",
        value: match err {
            VersionLabelError::Empty => String::new(),
            VersionLabelError::Invalid(value) => value,
        },
    })
}

pub(crate) fn is_safe_prompt_name(prompt: &str) -> bool {
    !prompt.is_empty() && prompt.split('/').all(is_safe_segment)
}

pub(crate) fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.starts_with('.')
        && !segment.contains(['/', '\\', '\0'])
}
