//! Directory-tree storage backend.
//!
//! # Responsibility
//! - Persist versions as `root/<project>/<prompt>/<label>/` directories.
//! - Keep each version's content, outputs and metadata as separate records.
//!
//! # Invariants
//! - A version directory is complete only when `prompt.txt` and
//!   `outputs.json` both exist; incomplete directories are skipped on read.
//! - Writes go to a hidden staging directory that is renamed into place, so
//!   a reader sees either the old or the new record set.
//! - Dot-prefixed entries belong to the backend and are never listed.
//! - Nested prompt `a/b` shares its directory with version `b` of prompt `a`.
//!   Deletes remove record files only; overwrites refuse directories that
//!   contain subdirectories.
//!
//! # Layout
//! ```text
//! root/<project>/<prompt>/<label>/prompt.txt
//!                                /outputs.json     {name: {output, meta}}
//!                                /meta.json        {..}
//!                                /created_at.txt   RFC 3339, optional
//! ```

use super::{
    check_project_name, check_prompt_name, check_version_label, StorageBackend, StorageError,
    StorageResult,
};
use crate::model::version::{
    is_valid_version_label, parse_timestamp, Meta, ModelOutput, PromptVersion,
};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

const CONTENT_FILE: &str = "prompt.txt";
const OUTPUTS_FILE: &str = "outputs.json";
const META_FILE: &str = "meta.json";
const CREATED_AT_FILE: &str = "created_at.txt";
const RECORD_FILES: [&str; 4] = [CONTENT_FILE, OUTPUTS_FILE, META_FILE, CREATED_AT_FILE];

#[derive(Serialize)]
struct OutputRecordRef<'a> {
    output: &'a str,
    meta: &'a Meta,
}

#[derive(Deserialize)]
struct OutputRecord {
    output: String,
    #[serde(default)]
    meta: Meta,
}

/// Filesystem-backed storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsStorageBackend {
    root: PathBuf,
}

impl FsStorageBackend {
    /// Creates a backend rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project: &str) -> StorageResult<PathBuf> {
        check_project_name(project)?;
        Ok(self.root.join(project))
    }

    fn prompt_dir(&self, project: &str, prompt: &str) -> StorageResult<PathBuf> {
        check_prompt_name(prompt)?;
        let mut dir = self.project_dir(project)?;
        for segment in prompt.split('/') {
            dir.push(segment);
        }
        Ok(dir)
    }

    fn version_dir(&self, project: &str, prompt: &str, label: &str) -> StorageResult<PathBuf> {
        check_version_label(label)?;
        Ok(self.prompt_dir(project, prompt)?.join(label))
    }

    fn existing_prompt_dir(&self, project: &str, prompt: &str) -> StorageResult<PathBuf> {
        let dir = self.prompt_dir(project, prompt)?;
        if !dir.is_dir() {
            return Err(StorageError::PromptNotFound {
                project: project.to_string(),
                prompt: prompt.to_string(),
            });
        }
        Ok(dir)
    }

    fn read_version(&self, dir: &Path, label: &str) -> StorageResult<Option<PromptVersion>> {
        let content_path = dir.join(CONTENT_FILE);
        let outputs_path = dir.join(OUTPUTS_FILE);
        // Why: a crash mid-write or a nested prompt directory leaves a label
        // directory without both required records; those are not versions.
        if !content_path.is_file() || !outputs_path.is_file() {
            return Ok(None);
        }

        let content =
            fs::read_to_string(&content_path).map_err(|err| io_error(&content_path, err))?;
        let stored: BTreeMap<String, OutputRecord> = read_json(&outputs_path)?;
        let model_outputs = stored
            .into_iter()
            .map(|(name, record)| {
                let output = ModelOutput::new(name.clone(), record.output).with_meta(record.meta);
                (name, output)
            })
            .collect();

        let meta_path = dir.join(META_FILE);
        let meta = if meta_path.is_file() {
            read_json::<Meta>(&meta_path)?
        } else {
            Meta::new()
        };

        Ok(Some(
            PromptVersion::new(label, content)
                .with_outputs(model_outputs)
                .with_meta(meta)
                .with_created_at(read_created_at(dir, &content_path)),
        ))
    }

    fn write_version_records(dir: &Path, version: &PromptVersion) -> StorageResult<()> {
        let outputs: BTreeMap<&str, OutputRecordRef<'_>> = version
            .model_outputs
            .iter()
            .map(|(name, output)| {
                (
                    name.as_str(),
                    OutputRecordRef {
                        output: output.output.as_str(),
                        meta: &output.meta,
                    },
                )
            })
            .collect();

        write_synced(&dir.join(META_FILE), to_json_bytes(&dir.join(META_FILE), &version.meta)?)?;
        write_synced(
            &dir.join(CREATED_AT_FILE),
            version.created_at.to_rfc3339().into_bytes(),
        )?;
        write_synced(&dir.join(CONTENT_FILE), version.content.as_bytes().to_vec())?;
        write_synced(&dir.join(OUTPUTS_FILE), to_json_bytes(&dir.join(OUTPUTS_FILE), &outputs)?)
    }

    fn swap_into_place(staging: &Path, target: &Path, label: &str) -> StorageResult<()> {
        if !target.exists() {
            return fs::rename(staging, target).map_err(|err| io_error(target, err));
        }

        let parent = target.parent().unwrap_or(target);
        let replaced = parent.join(format!(".{label}.replaced-{}", Uuid::new_v4()));
        // Why: rename is the only step that replaces a directory in one move;
        // the old records stay recoverable under `replaced` until the swap lands.
        fs::rename(target, &replaced).map_err(|err| io_error(target, err))?;
        if let Err(err) = fs::rename(staging, target) {
            // Put the previous record back so the label stays readable.
            if let Err(restore_err) = fs::rename(&replaced, target) {
                error!(
                    "event=version_save module=storage status=error step=restore path={} error={}",
                    replaced.display(),
                    restore_err
                );
            }
            return Err(io_error(target, err));
        }
        if let Err(err) = fs::remove_dir_all(&replaced) {
            warn!(
                "event=version_save module=storage status=warn step=cleanup path={} error={}",
                replaced.display(),
                err
            );
        }
        Ok(())
    }
}

impl StorageBackend for FsStorageBackend {
    fn list_projects(&self) -> StorageResult<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        list_dir_names(&self.root)
    }

    fn list_prompts(&self, project: &str) -> StorageResult<Vec<String>> {
        let dir = self.project_dir(project)?;
        if !dir.is_dir() {
            return Err(StorageError::ProjectNotFound(project.to_string()));
        }
        list_dir_names(&dir)
    }

    fn exists_prompt(&self, project: &str, prompt: &str) -> StorageResult<bool> {
        Ok(self.prompt_dir(project, prompt)?.is_dir())
    }

    fn load_versions(&self, project: &str, prompt: &str) -> StorageResult<Vec<PromptVersion>> {
        let started_at = Instant::now();
        let dir = self.existing_prompt_dir(project, prompt)?;

        let mut versions = Vec::new();
        let mut skipped = 0usize;
        for label in list_dir_names(&dir)? {
            if !is_valid_version_label(&label) {
                skipped += 1;
                continue;
            }
            match self.read_version(&dir.join(&label), &label)? {
                Some(version) => versions.push(version),
                None => skipped += 1,
            }
        }

        debug!(
            "event=versions_load module=storage status=ok project={} prompt={} count={} skipped={} duration_ms={}",
            project,
            prompt,
            versions.len(),
            skipped,
            started_at.elapsed().as_millis()
        );
        Ok(versions)
    }

    fn list_versions(&self, project: &str, prompt: &str) -> StorageResult<Vec<String>> {
        let dir = self.existing_prompt_dir(project, prompt)?;
        Ok(list_dir_names(&dir)?
            .into_iter()
            .filter(|label| is_valid_version_label(label))
            .filter(|label| {
                let version_dir = dir.join(label);
                version_dir.join(CONTENT_FILE).is_file() && version_dir.join(OUTPUTS_FILE).is_file()
            })
            .collect())
    }

    fn save_version(
        &self,
        project: &str,
        prompt: &str,
        version: &PromptVersion,
        overwrite: bool,
    ) -> StorageResult<()> {
        let started_at = Instant::now();
        let label = version.version.as_str();
        let target = self.version_dir(project, prompt, label)?;
        if target.is_dir() && has_child_dirs(&target)? {
            warn!(
                "event=version_save module=storage status=conflict project={} prompt={} version={} path={}",
                project,
                prompt,
                label,
                target.display()
            );
            return Err(StorageError::NamespaceConflict(target));
        }
        if target.exists() && !overwrite {
            return Err(StorageError::VersionDirExists(target));
        }

        let prompt_dir = self.prompt_dir(project, prompt)?;
        fs::create_dir_all(&prompt_dir).map_err(|err| io_error(&prompt_dir, err))?;

        let staging = prompt_dir.join(format!(".{label}.staging-{}", Uuid::new_v4()));
        fs::create_dir(&staging).map_err(|err| io_error(&staging, err))?;

        let written = Self::write_version_records(&staging, version)
            .and_then(|()| Self::swap_into_place(&staging, &target, label));
        if let Err(err) = written {
            let _ = fs::remove_dir_all(&staging);
            error!(
                "event=version_save module=storage status=error project={} prompt={} version={} duration_ms={} error={}",
                project,
                prompt,
                label,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        info!(
            "event=version_save module=storage status=ok project={} prompt={} version={} overwrite={} duration_ms={}",
            project,
            prompt,
            label,
            overwrite,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn delete_version(&self, project: &str, prompt: &str, label: &str) -> StorageResult<()> {
        let dir = self.version_dir(project, prompt, label)?;
        let records: Vec<PathBuf> = RECORD_FILES
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| path.is_file())
            .collect();
        if records.is_empty() {
            debug!(
                "event=version_delete module=storage status=noop project={} prompt={} version={}",
                project, prompt, label
            );
            return Ok(());
        }

        if has_child_dirs(&dir)? {
            // Only this version's records go; the nested prompt stays.
            for path in &records {
                fs::remove_file(path).map_err(|err| io_error(path, err))?;
            }
        } else {
            fs::remove_dir_all(&dir).map_err(|err| io_error(&dir, err))?;
        }
        info!(
            "event=version_delete module=storage status=ok project={} prompt={} version={}",
            project, prompt, label
        );
        Ok(())
    }

    fn mkdir_project(&self, project: &str) -> StorageResult<()> {
        let dir = self.project_dir(project)?;
        fs::create_dir_all(&dir).map_err(|err| io_error(&dir, err))
    }

    fn mkdir_prompt(&self, project: &str, prompt: &str) -> StorageResult<()> {
        let dir = self.prompt_dir(project, prompt)?;
        fs::create_dir_all(&dir).map_err(|err| io_error(&dir, err))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// True when `dir` contains any child directory, hidden ones included.
fn has_child_dirs(dir: &Path) -> StorageResult<bool> {
    for entry in fs::read_dir(dir).map_err(|err| io_error(dir, err))? {
        let entry = entry.map_err(|err| io_error(dir, err))?;
        if entry.path().is_dir() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Sorted names of visible child directories.
fn list_dir_names(dir: &Path) -> StorageResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|err| io_error(dir, err))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| io_error(dir, err))?;
        let is_dir = entry
            .file_type()
            .map_err(|err| io_error(&entry.path(), err))?
            .is_dir();
        if !is_dir {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let raw = fs::read_to_string(path).map_err(|err| io_error(path, err))?;
    serde_json::from_str(&raw).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn to_json_bytes<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_synced(path: &Path, bytes: Vec<u8>) -> StorageResult<()> {
    let mut file = fs::File::create(path).map_err(|err| io_error(path, err))?;
    file.write_all(&bytes).map_err(|err| io_error(path, err))?;
    file.sync_all().map_err(|err| io_error(path, err))
}

fn read_created_at(dir: &Path, content_path: &Path) -> DateTime<Utc> {
    if let Some(stamp) = fs::read_to_string(dir.join(CREATED_AT_FILE))
        .ok()
        .and_then(|raw| parse_timestamp(&raw))
    {
        return stamp;
    }
    fs::metadata(content_path)
        .and_then(|metadata| metadata.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
