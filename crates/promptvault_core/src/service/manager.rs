//! Manager facade: the single entry point for callers.
//!
//! # Responsibility
//! - Resolve path strings and pairs into project/prompt handles.
//! - Auto-provision project/prompt namespaces on first access.
//! - Orchestrate import: parse, provision destination, persist.
//!
//! # Invariants
//! - A rejected import document never creates a directory.
//! - Imported versions are written with overwrite semantics.

use crate::config::VaultConfig;
use crate::service::path::IntoPromptPath;
use crate::service::project::Project;
use crate::service::prompt::{Prompt, PromptResult};
use crate::storage::{FsStorageBackend, StorageBackend};
use log::{info, warn};
use std::path::Path;

/// Facade over one storage backend.
pub struct PromptManager<B: StorageBackend = FsStorageBackend> {
    backend: B,
}

impl PromptManager<FsStorageBackend> {
    /// Manager over a directory tree rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_backend(FsStorageBackend::new(root.as_ref()))
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(&config.root)
    }
}

impl<B: StorageBackend> PromptManager<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn list_projects(&self) -> PromptResult<Vec<String>> {
        Ok(self.backend.list_projects()?)
    }

    /// Returns a project handle, creating its namespace when missing.
    pub fn get_project(&self, name: &str) -> PromptResult<Project<'_, B>> {
        self.backend.mkdir_project(name)?;
        Ok(Project::new(&self.backend, name))
    }

    /// Resolves `"/project/prompt"`, `"project/prompt"` or a pair.
    pub fn get_prompt(&self, path: impl IntoPromptPath) -> PromptResult<Prompt<'_, B>> {
        let path = path.into_prompt_path()?;
        self.get_project(&path.project)?.get_prompt(&path.prompt)
    }

    /// Imports an export file, optionally renamed to `dest` (`project/prompt`).
    ///
    /// Existing destination versions with the same labels are overwritten.
    pub fn import_prompt(
        &self,
        file: impl AsRef<Path>,
        dest: Option<&str>,
    ) -> PromptResult<Prompt<'_, B>> {
        let file = file.as_ref();
        let mut prompt = match Prompt::from_export(&self.backend, file, dest) {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(
                    "event=prompt_import module=service status=error file={} error={}",
                    file.display(),
                    err
                );
                return Err(err);
            }
        };

        self.backend.mkdir_prompt(prompt.project(), prompt.name())?;
        let report = prompt.save(true)?;
        info!(
            "event=prompt_import module=service status=ok file={} project={} prompt={} written={}",
            file.display(),
            prompt.project(),
            prompt.name(),
            report.written.len()
        );
        Ok(prompt)
    }
}
