//! Prompt path resolution (`"/project/prompt"` or `(project, prompt)`).

use crate::service::prompt::{PromptError, PromptResult};
use std::fmt::{Display, Formatter};

/// Project/prompt pair addressed by a facade call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPath {
    pub project: String,
    pub prompt: String,
}

impl PromptPath {
    pub fn new(project: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            prompt: prompt.into(),
        }
    }

    /// Splits a slash-delimited path at its first separator.
    ///
    /// A leading slash is optional. Everything after the project segment is
    /// the prompt name, so `demo/hello/j2` addresses prompt `hello/j2`.
    pub fn parse(raw: &str) -> PromptResult<Self> {
        let trimmed = raw.trim().trim_start_matches('/');
        match trimmed.split_once('/') {
            Some((project, prompt)) if !project.is_empty() && !prompt.is_empty() => {
                Ok(Self::new(project, prompt))
            }
            _ => Err(PromptError::InvalidPath(raw.to_string())),
        }
    }
}

impl Display for PromptPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project, self.prompt)
    }
}

/// Inputs accepted wherever a prompt path is expected.
pub trait IntoPromptPath {
    fn into_prompt_path(self) -> PromptResult<PromptPath>;
}

impl IntoPromptPath for PromptPath {
    fn into_prompt_path(self) -> PromptResult<PromptPath> {
        Ok(self)
    }
}

impl IntoPromptPath for &str {
    fn into_prompt_path(self) -> PromptResult<PromptPath> {
        PromptPath::parse(self)
    }
}

impl IntoPromptPath for &String {
    fn into_prompt_path(self) -> PromptResult<PromptPath> {
        PromptPath::parse(self)
    }
}

impl IntoPromptPath for String {
    fn into_prompt_path(self) -> PromptResult<PromptPath> {
        PromptPath::parse(&self)
    }
}

impl IntoPromptPath for (&str, &str) {
    fn into_prompt_path(self) -> PromptResult<PromptPath> {
        Ok(PromptPath::new(self.0, self.1))
    }
}

impl IntoPromptPath for [&str; 2] {
    fn into_prompt_path(self) -> PromptResult<PromptPath> {
        Ok(PromptPath::new(self[0], self[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::{IntoPromptPath, PromptPath};
    use crate::service::prompt::PromptError;

    #[test]
    fn parse_strips_leading_slash() {
        assert_eq!(
            PromptPath::parse("/demo/greeting").unwrap(),
            PromptPath::new("demo", "greeting")
        );
        assert_eq!(
            "demo/greeting".into_prompt_path().unwrap(),
            ("demo", "greeting").into_prompt_path().unwrap()
        );
    }

    #[test]
    fn parse_keeps_nested_prompt_names() {
        let path = PromptPath::parse("demo/hello/j2").unwrap();
        assert_eq!(path.project, "demo");
        assert_eq!(path.prompt, "hello/j2");
        assert_eq!(path.to_string(), "demo/hello/j2");
    }

    #[test]
    fn parse_rejects_missing_prompt() {
        for raw in ["demo", "/demo/", "", "//x"] {
            assert!(
                matches!(PromptPath::parse(raw), Err(PromptError::InvalidPath(_))),
                "path `{raw}` should be rejected"
            );
        }
    }
}
