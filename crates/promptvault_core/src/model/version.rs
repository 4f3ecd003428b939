//! Prompt version record and version-label policy.
//!
//! # Responsibility
//! - Define the snapshot stored for one prompt revision.
//! - Own label validation and auto-numbering (`v0001`, `v0002`, ...).
//! - Normalize "string or structured" model output input in one place.
//!
//! # Invariants
//! - A label is non-empty and matches `^v\d+$` or `^[A-Za-z0-9_-]+$`.
//! - Valid labels never contain path separators or dots, so a label is
//!   always safe to use as a directory name.
//! - `model_outputs` keys equal the `model_name` of their value.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Free-form JSON metadata attached to versions and model outputs.
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// First label handed out by auto-numbering.
pub const FIRST_VERSION_LABEL: &str = "v0001";

const AUTO_LABEL_WIDTH: usize = 4;

static NUMERIC_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v(\d+)$").expect("valid numeric label regex"));
static CUSTOM_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid custom label regex"));

/// Label validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionLabelError {
    /// Label is empty.
    Empty,
    /// Label contains characters outside `[A-Za-z0-9_-]`.
    Invalid(String),
}

impl Display for VersionLabelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "version label must not be empty"),
            Self::Invalid(value) => write!(
                f,
                "invalid version label `{value}` (expected v<digits> or [A-Za-z0-9_-]+)"
            ),
        }
    }
}

impl Error for VersionLabelError {}

/// Checks a caller-provided or persisted version label.
pub fn validate_version_label(label: &str) -> Result<(), VersionLabelError> {
    if label.is_empty() {
        return Err(VersionLabelError::Empty);
    }
    if NUMERIC_LABEL_RE.is_match(label) || CUSTOM_LABEL_RE.is_match(label) {
        return Ok(());
    }
    Err(VersionLabelError::Invalid(label.to_string()))
}

/// Returns whether `label` passes [`validate_version_label`].
pub fn is_valid_version_label(label: &str) -> bool {
    validate_version_label(label).is_ok()
}

/// Returns the numeric part of an auto-numbered label (`v0012` -> 12).
///
/// Labels whose digits overflow `u64` are treated as custom labels.
pub fn numeric_label_value(label: &str) -> Option<u64> {
    NUMERIC_LABEL_RE
        .captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
}

/// Computes the next auto label for a history.
///
/// Custom labels are ignored. When no numeric label exists the sequence
/// restarts at [`FIRST_VERSION_LABEL`].
pub fn next_version(existing: &[PromptVersion]) -> String {
    next_version_for_labels(existing.iter().map(|version| version.version.as_str()))
}

/// Label-only variant of [`next_version`].
pub fn next_version_for_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> String {
    match labels.into_iter().filter_map(numeric_label_value).max() {
        Some(last) => format_auto_label(last.saturating_add(1)),
        None => FIRST_VERSION_LABEL.to_string(),
    }
}

fn format_auto_label(value: u64) -> String {
    format!("v{value:0width$}", width = AUTO_LABEL_WIDTH)
}

/// One named model's recorded response for a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub model_name: String,
    pub output: String,
    #[serde(default)]
    pub meta: Meta,
}

impl ModelOutput {
    pub fn new(model_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            output: output.into(),
            meta: Meta::new(),
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }
}

/// Model output as accepted at mutation entry points.
///
/// Deserializes from either a bare JSON string or `{"output": .., "meta": ..}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    Text(String),
    Structured {
        output: String,
        #[serde(default)]
        meta: Meta,
    },
}

impl OutputValue {
    /// Structured output with explicit metadata.
    pub fn structured(output: impl Into<String>, meta: Meta) -> Self {
        Self::Structured {
            output: output.into(),
            meta,
        }
    }

    /// Canonical stored form for `model_name`.
    pub fn into_model_output(self, model_name: impl Into<String>) -> ModelOutput {
        match self {
            Self::Text(output) => ModelOutput::new(model_name, output),
            Self::Structured { output, meta } => {
                ModelOutput::new(model_name, output).with_meta(meta)
            }
        }
    }
}

impl From<&str> for OutputValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for OutputValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ModelOutput> for OutputValue {
    fn from(value: ModelOutput) -> Self {
        Self::Structured {
            output: value.output,
            meta: value.meta,
        }
    }
}

/// Normalizes a batch of flexible outputs keyed by model name.
pub fn normalize_outputs<I, K, V>(outputs: I) -> BTreeMap<String, ModelOutput>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<OutputValue>,
{
    outputs
        .into_iter()
        .map(|(name, value)| {
            let name = name.into();
            let output = value.into().into_model_output(name.clone());
            (name, output)
        })
        .collect()
}

/// Snapshot of one prompt revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVersion {
    /// Label unique within one prompt (`v0001`, `custom-1`, ...).
    pub version: String,
    pub content: String,
    pub model_outputs: BTreeMap<String, ModelOutput>,
    #[serde(default)]
    pub meta: Meta,
    /// Serialized as RFC 3339; naive ISO-8601 input is read as UTC.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl PromptVersion {
    /// Creates an empty version stamped with the current time.
    ///
    /// The label is not validated here; aggregates validate before appending.
    pub fn new(version: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            content: content.into(),
            model_outputs: BTreeMap::new(),
            meta: Meta::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_outputs(mut self, model_outputs: BTreeMap<String, ModelOutput>) -> Self {
        self.model_outputs = model_outputs;
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Inserts or replaces the output recorded for `model_name`.
    pub fn upsert_output(&mut self, model_name: impl Into<String>, value: impl Into<OutputValue>) {
        let model_name = model_name.into();
        let output = value.into().into_model_output(model_name.clone());
        self.model_outputs.insert(model_name, output);
    }

    /// Merges `update` into `meta`, or replaces `meta` when `replace` is set.
    pub fn apply_meta(&mut self, update: Meta, replace: bool) {
        if replace {
            self.meta = update;
        } else {
            self.meta.extend(update);
        }
    }

    /// Returns whether the label came from auto-numbering.
    pub fn is_auto_numbered(&self) -> bool {
        numeric_label_value(&self.version).is_some()
    }
}

pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid created_at timestamp `{raw}`"))
        })
    }

    /// Parses RFC 3339, falling back to naive ISO-8601 interpreted as UTC.
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let trimmed = raw.trim();
        if let Ok(value) = DateTime::parse_from_rfc3339(trimmed) {
            return Some(value.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(trimmed, NAIVE_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

pub(crate) use timestamp::parse as parse_timestamp;

#[cfg(test)]
mod tests {
    use super::{
        next_version, next_version_for_labels, numeric_label_value, parse_timestamp,
        validate_version_label, OutputValue, PromptVersion, VersionLabelError,
    };
    use serde_json::json;

    #[test]
    fn next_version_starts_at_first_label() {
        assert_eq!(next_version(&[]), "v0001");
    }

    #[test]
    fn next_version_skips_custom_labels() {
        let history = vec![
            PromptVersion::new("v0003", "a"),
            PromptVersion::new("custom-9", "b"),
            PromptVersion::new("v0001", "c"),
        ];
        assert_eq!(next_version(&history), "v0004");
    }

    #[test]
    fn next_version_restarts_when_only_custom_labels_exist() {
        assert_eq!(next_version_for_labels(["draft", "final"]), "v0001");
    }

    #[test]
    fn next_version_grows_past_padding_width() {
        assert_eq!(next_version_for_labels(["v9999"]), "v10000");
    }

    #[test]
    fn numeric_label_value_rejects_overflow() {
        assert_eq!(numeric_label_value("v0042"), Some(42));
        assert_eq!(numeric_label_value("v99999999999999999999999"), None);
        assert_eq!(numeric_label_value("version2"), None);
    }

    #[test]
    fn validate_rejects_traversal_and_separators() {
        assert_eq!(validate_version_label(""), Err(VersionLabelError::Empty));
        for label in ["..", "../etc", "a/b", "v1.2", "with space"] {
            assert!(
                matches!(
                    validate_version_label(label),
                    Err(VersionLabelError::Invalid(_))
                ),
                "label `{label}` should be rejected"
            );
        }
        assert!(validate_version_label("custom_1-final").is_ok());
    }

    #[test]
    fn output_value_accepts_string_or_structured_json() {
        let text: OutputValue = serde_json::from_value(json!("Hi!")).unwrap();
        assert_eq!(text, OutputValue::Text("Hi!".to_string()));

        let structured: OutputValue =
            serde_json::from_value(json!({"output": "Hello.", "meta": {"temp": 0.3}})).unwrap();
        let output = structured.into_model_output("llama3");
        assert_eq!(output.model_name, "llama3");
        assert_eq!(output.output, "Hello.");
        assert_eq!(output.meta["temp"], json!(0.3));
    }

    #[test]
    fn parse_timestamp_accepts_naive_iso() {
        let parsed = parse_timestamp("2024-05-01T10:20:30.123456").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T10:20:30.123456+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }
}
