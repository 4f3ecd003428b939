//! Prompt aggregate: one prompt's in-memory version history.
//!
//! # Responsibility
//! - Lazily load the full history from a storage backend.
//! - Own version numbering and in-memory mutation of versions.
//! - Diff in-memory state against disk on `save`.
//! - Export/import the history as a portable JSON document.
//!
//! # Invariants
//! - Labels are unique within `versions`.
//! - `latest` is the last element of `versions`, not the highest number.
//! - Mutations never touch storage until `save`, except `delete_version`.
//! - A failed import never yields a partially built aggregate.

use crate::model::export::{ExportFormatError, PromptExport};
use crate::model::version::{
    next_version, normalize_outputs, validate_version_label, Meta, OutputValue, PromptVersion,
    VersionLabelError,
};
use crate::service::path::PromptPath;
use crate::storage::{StorageBackend, StorageError};
use log::{debug, info};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub type PromptResult<T> = Result<T, PromptError>;

/// Errors from prompt/project/manager operations.
#[derive(Debug)]
pub enum PromptError {
    /// Project namespace does not exist.
    ProjectNotFound(String),
    /// Prompt namespace does not exist.
    PromptNotFound { project: String, prompt: String },
    /// No version with this label in the history.
    VersionNotFound(String),
    /// Label already used in the history.
    VersionExists(String),
    /// Label syntax is invalid.
    InvalidVersionLabel(VersionLabelError),
    /// Import source is unreadable or structurally invalid.
    ImportBadFormat(ImportFormatError),
    /// Path string cannot be split into project and prompt.
    InvalidPath(String),
    /// Any other storage failure.
    Storage(StorageError),
}

/// Cause of an [`PromptError::ImportBadFormat`].
#[derive(Debug)]
pub enum ImportFormatError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Document(ExportFormatError),
}

impl Display for ImportFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            Self::Document(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportFormatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Document(err) => Some(err),
        }
    }
}

impl Display for PromptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectNotFound(project) => write!(f, "project not found: {project}"),
            Self::PromptNotFound { project, prompt } => {
                write!(f, "prompt not found: {project}/{prompt}")
            }
            Self::VersionNotFound(label) => write!(f, "version not found: {label}"),
            Self::VersionExists(label) => write!(f, "version already exists: {label}"),
            Self::InvalidVersionLabel(err) => write!(f, "{err}"),
            Self::ImportBadFormat(err) => write!(f, "bad import format: {err}"),
            Self::InvalidPath(path) => {
                write!(f, "invalid prompt path `{path}` (expected project/prompt)")
            }
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidVersionLabel(err) => Some(err),
            Self::ImportBadFormat(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for PromptError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::ProjectNotFound(project) => Self::ProjectNotFound(project),
            StorageError::PromptNotFound { project, prompt } => {
                Self::PromptNotFound { project, prompt }
            }
            other => Self::Storage(other),
        }
    }
}

impl From<VersionLabelError> for PromptError {
    fn from(value: VersionLabelError) -> Self {
        Self::InvalidVersionLabel(value)
    }
}

impl From<ImportFormatError> for PromptError {
    fn from(value: ImportFormatError) -> Self {
        Self::ImportBadFormat(value)
    }
}

/// Partial update applied by [`Prompt::modify_version`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionUpdate {
    /// Replaces content when set.
    pub content: Option<String>,
    /// Upserted by model name when set.
    pub model_outputs: Option<BTreeMap<String, OutputValue>>,
    /// Merged into (or replacing) metadata when set.
    pub meta_update: Option<Meta>,
    /// Replace metadata instead of merging. Ignored without `meta_update`.
    pub replace_meta: bool,
}

impl VersionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn output(mut self, model_name: impl Into<String>, value: impl Into<OutputValue>) -> Self {
        self.model_outputs
            .get_or_insert_with(BTreeMap::new)
            .insert(model_name.into(), value.into());
        self
    }

    pub fn meta_update(mut self, meta: Meta) -> Self {
        self.meta_update = Some(meta);
        self
    }

    pub fn replace_meta(mut self, meta: Meta) -> Self {
        self.meta_update = Some(meta);
        self.replace_meta = true;
        self
    }
}

/// Labels written and skipped by one [`Prompt::save`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

/// In-memory view over one prompt's history, borrowed from its backend.
pub struct Prompt<'b, B: StorageBackend + ?Sized> {
    project: String,
    name: String,
    backend: &'b B,
    versions: Vec<PromptVersion>,
    loaded: bool,
}

impl<B: StorageBackend + ?Sized> std::fmt::Debug for Prompt<'_, B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompt")
            .field("project", &self.project)
            .field("name", &self.name)
            .field("loaded", &self.loaded)
            .field("versions", &self.versions.len())
            .finish()
    }
}

impl<'b, B: StorageBackend + ?Sized> Prompt<'b, B> {
    /// Creates an unloaded prompt. Nothing is read until the first access.
    pub fn new(backend: &'b B, project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            backend,
            versions: Vec::new(),
            loaded: false,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `project/name` path of this prompt.
    pub fn path(&self) -> String {
        format!("{}/{}", self.project, self.name)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn ensure_loaded(&mut self) -> PromptResult<()> {
        if !self.loaded {
            self.versions = self.backend.load_versions(&self.project, &self.name)?;
            self.loaded = true;
            debug!(
                "event=prompt_load module=service status=ok project={} prompt={} count={}",
                self.project,
                self.name,
                self.versions.len()
            );
        }
        Ok(())
    }

    /// Drops unsaved in-memory state and re-reads the history from storage.
    pub fn reload(&mut self) -> PromptResult<()> {
        self.loaded = false;
        self.versions.clear();
        self.ensure_loaded()
    }

    /// Full ordered history.
    pub fn versions(&mut self) -> PromptResult<&[PromptVersion]> {
        self.ensure_loaded()?;
        Ok(&self.versions)
    }

    pub fn version_labels(&mut self) -> PromptResult<Vec<String>> {
        Ok(self
            .versions()?
            .iter()
            .map(|version| version.version.clone())
            .collect())
    }

    /// Last element of the history, if any.
    pub fn latest(&mut self) -> PromptResult<Option<&PromptVersion>> {
        self.ensure_loaded()?;
        Ok(self.versions.last())
    }

    pub fn get_version(&mut self, label: &str) -> PromptResult<&PromptVersion> {
        let index = self.position(label)?;
        Ok(&self.versions[index])
    }

    fn position(&mut self, label: &str) -> PromptResult<usize> {
        self.ensure_loaded()?;
        self.versions
            .iter()
            .position(|version| version.version == label)
            .ok_or_else(|| PromptError::VersionNotFound(label.to_string()))
    }

    /// Appends a new version to the in-memory history.
    ///
    /// Without `label` the next auto label is assigned. Outputs accept bare
    /// strings or structured [`OutputValue`]s.
    ///
    /// # Errors
    /// - `InvalidVersionLabel` when `label` fails validation.
    /// - `VersionExists` when the label is already in the history.
    pub fn add_version<I, K, V>(
        &mut self,
        content: impl Into<String>,
        model_outputs: I,
        meta: Option<Meta>,
        label: Option<&str>,
    ) -> PromptResult<&PromptVersion>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<OutputValue>,
    {
        self.ensure_loaded()?;

        let label = match label {
            Some(custom) => {
                validate_version_label(custom)?;
                custom.to_string()
            }
            None => next_version(&self.versions),
        };
        if self.versions.iter().any(|version| version.version == label) {
            return Err(PromptError::VersionExists(label));
        }

        let version = PromptVersion::new(label, content)
            .with_outputs(normalize_outputs(model_outputs))
            .with_meta(meta.unwrap_or_default());
        debug!(
            "event=version_add module=service status=ok project={} prompt={} version={}",
            self.project, self.name, version.version
        );
        self.versions.push(version);
        Ok(&self.versions[self.versions.len() - 1])
    }

    /// Applies a partial update to an existing version in place.
    pub fn modify_version(
        &mut self,
        label: &str,
        update: VersionUpdate,
    ) -> PromptResult<&PromptVersion> {
        let index = self.position(label)?;
        let version = &mut self.versions[index];

        if let Some(content) = update.content {
            version.content = content;
        }
        if let Some(outputs) = update.model_outputs {
            for (model_name, value) in outputs {
                version.upsert_output(model_name, value);
            }
        }
        if let Some(meta) = update.meta_update {
            version.apply_meta(meta, update.replace_meta);
        }
        Ok(&self.versions[index])
    }

    /// Upserts one model output into an existing version.
    pub fn add_model_output(
        &mut self,
        label: &str,
        model_name: impl Into<String>,
        output: impl Into<OutputValue>,
    ) -> PromptResult<&PromptVersion> {
        let index = self.position(label)?;
        self.versions[index].upsert_output(model_name, output);
        Ok(&self.versions[index])
    }

    /// Removes a version from memory and from storage.
    ///
    /// The storage delete is issued even when the label was never persisted;
    /// deleting an unknown label is a no-op.
    pub fn delete_version(&mut self, label: &str) -> PromptResult<()> {
        self.ensure_loaded()?;
        self.versions.retain(|version| version.version != label);
        self.backend
            .delete_version(&self.project, &self.name, label)?;
        Ok(())
    }

    /// Moves a version to the end of the history, making it `latest`.
    pub fn select_version(&mut self, label: &str) -> PromptResult<&PromptVersion> {
        let index = self.position(label)?;
        let version = self.versions.remove(index);
        self.versions.push(version);
        Ok(&self.versions[self.versions.len() - 1])
    }

    /// Writes in-memory versions to storage.
    ///
    /// The on-disk label set is queried fresh. Labels already on disk are
    /// skipped unless `overwrite_existing` is set.
    pub fn save(&mut self, overwrite_existing: bool) -> PromptResult<SaveReport> {
        self.ensure_loaded()?;
        // Why: the skip decision must reflect disk now, not the snapshot taken
        // at load time; another handle may have written since.
        let on_disk: HashSet<String> = self
            .backend
            .list_versions(&self.project, &self.name)?
            .into_iter()
            .collect();

        let mut report = SaveReport::default();
        for version in &self.versions {
            if on_disk.contains(&version.version) && !overwrite_existing {
                report.skipped.push(version.version.clone());
                continue;
            }
            self.backend
                .save_version(&self.project, &self.name, version, overwrite_existing)?;
            report.written.push(version.version.clone());
        }

        info!(
            "event=prompt_save module=service status=ok project={} prompt={} written={} skipped={} overwrite={}",
            self.project,
            self.name,
            report.written.len(),
            report.skipped.len(),
            overwrite_existing
        );
        Ok(report)
    }

    /// Snapshot of names plus full history as an export document.
    pub fn export_document(&mut self) -> PromptResult<PromptExport> {
        self.ensure_loaded()?;
        Ok(PromptExport::new(
            self.project.clone(),
            self.name.clone(),
            self.versions.clone(),
        ))
    }

    pub fn export_json(&mut self) -> PromptResult<String> {
        let document = self.export_document()?;
        document.to_json_pretty().map_err(|source| {
            PromptError::Storage(StorageError::Json {
                path: PathBuf::from(self.path()),
                source,
            })
        })
    }

    /// Writes the export document to `to_file`, creating parent directories.
    pub fn export(&mut self, to_file: impl AsRef<Path>) -> PromptResult<PathBuf> {
        let to_file = to_file.as_ref();
        let json = self.export_json()?;
        if let Some(parent) = to_file.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| {
                PromptError::Storage(StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })
            })?;
        }
        fs::write(to_file, json).map_err(|source| {
            PromptError::Storage(StorageError::Io {
                path: to_file.to_path_buf(),
                source,
            })
        })?;
        info!(
            "event=prompt_export module=service status=ok project={} prompt={} count={}",
            self.project,
            self.name,
            self.versions.len()
        );
        Ok(to_file.to_path_buf())
    }

    /// Builds an already-loaded prompt from an export file without writing.
    ///
    /// `dest` (`project/prompt`) replaces the names embedded in the document.
    pub fn from_export(
        backend: &'b B,
        file: impl AsRef<Path>,
        dest: Option<&str>,
    ) -> PromptResult<Self> {
        let file = file.as_ref();
        let raw = fs::read_to_string(file).map_err(|source| ImportFormatError::Read {
            path: file.to_path_buf(),
            source,
        })?;
        Self::from_export_json(backend, &raw, dest)
    }

    /// String variant of [`Prompt::from_export`].
    pub fn from_export_json(backend: &'b B, raw: &str, dest: Option<&str>) -> PromptResult<Self> {
        let document = PromptExport::from_json(raw).map_err(ImportFormatError::Document)?;
        let (project, name) = match dest.filter(|dest| !dest.trim().is_empty()) {
            Some(dest) => {
                let path = PromptPath::parse(dest)?;
                (path.project, path.prompt)
            }
            None => {
                document
                    .check_names()
                    .map_err(ImportFormatError::Document)?;
                (document.project, document.prompt)
            }
        };

        Ok(Self {
            project,
            name,
            backend,
            versions: document.versions,
            loaded: true,
        })
    }
}
