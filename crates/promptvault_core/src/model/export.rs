//! Portable export document for one prompt.
//!
//! # Responsibility
//! - Define the self-describing JSON shape written by export.
//! - Parse and structurally validate documents before any aggregate is built.
//!
//! # Invariants
//! - A parsed document never contains invalid or duplicate version labels.
//! - `model_outputs` entries are keyed by their `model_name`.

use crate::model::version::{validate_version_label, PromptVersion, VersionLabelError};
use crate::storage::{is_safe_prompt_name, is_safe_segment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Export document: project/prompt names plus full ordered history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptExport {
    pub project: String,
    pub prompt: String,
    pub versions: Vec<PromptVersion>,
}

/// Structural failure while reading an export document.
#[derive(Debug)]
pub enum ExportFormatError {
    /// Malformed JSON or missing/mistyped required fields.
    Json(serde_json::Error),
    /// A version label fails label validation.
    InvalidLabel(VersionLabelError),
    /// The same label appears more than once.
    DuplicateVersion(String),
    /// `project` or `prompt` cannot be used as a namespace.
    InvalidName { kind: &'static str, value: String },
}

impl Display for ExportFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed export document: {err}"),
            Self::InvalidLabel(err) => write!(f, "export document has {err}"),
            Self::DuplicateVersion(label) => {
                write!(f, "export document repeats version `{label}`")
            }
            Self::InvalidName { kind, value } => {
                write!(f, "export document has invalid {kind} name `{value}`")
            }
        }
    }
}

impl Error for ExportFormatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InvalidLabel(err) => Some(err),
            Self::DuplicateVersion(_) | Self::InvalidName { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ExportFormatError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<VersionLabelError> for ExportFormatError {
    fn from(value: VersionLabelError) -> Self {
        Self::InvalidLabel(value)
    }
}

impl PromptExport {
    pub fn new(
        project: impl Into<String>,
        prompt: impl Into<String>,
        versions: Vec<PromptVersion>,
    ) -> Self {
        Self {
            project: project.into(),
            prompt: prompt.into(),
            versions,
        }
    }

    /// Pretty-printed UTF-8 JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses and validates a document.
    pub fn from_json(raw: &str) -> Result<Self, ExportFormatError> {
        let mut document: PromptExport = serde_json::from_str(raw)?;
        document.validate()?;
        document.normalize_output_names();
        Ok(document)
    }

    fn validate(&self) -> Result<(), ExportFormatError> {
        let mut seen = BTreeSet::new();
        for version in &self.versions {
            validate_version_label(&version.version)?;
            if !seen.insert(version.version.as_str()) {
                return Err(ExportFormatError::DuplicateVersion(version.version.clone()));
            }
        }
        Ok(())
    }

    /// Checks that the embedded names are usable as a storage destination.
    pub fn check_names(&self) -> Result<(), ExportFormatError> {
        if !is_safe_segment(&self.project) {
            return Err(ExportFormatError::InvalidName {
                kind: "project",
                value: self.project.clone(),
            });
        }
        if !is_safe_prompt_name(&self.prompt) {
            return Err(ExportFormatError::InvalidName {
                kind: "prompt",
                value: self.prompt.clone(),
            });
        }
        Ok(())
    }

    fn normalize_output_names(&mut self) {
        for version in &mut self.versions {
            for (name, output) in version.model_outputs.iter_mut() {
                if output.model_name != *name {
                    output.model_name = name.clone();
                }
            }
        }
    }
}
