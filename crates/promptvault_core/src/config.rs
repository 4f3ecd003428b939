//! Runtime configuration for embedding callers.
//!
//! Values resolve in order: explicit setters, environment, defaults.

use crate::logging::{default_log_level, init_logging, LoggingError};
use std::path::PathBuf;

/// Environment variable naming the storage root.
pub const ENV_ROOT: &str = "PROMPTVAULT_ROOT";
/// Environment variable naming the log level.
pub const ENV_LOG_LEVEL: &str = "PROMPTVAULT_LOG_LEVEL";
/// Environment variable naming the absolute log directory.
pub const ENV_LOG_DIR: &str = "PROMPTVAULT_LOG_DIR";

const DEFAULT_ROOT: &str = "prompts";

/// Storage and logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Root directory of the prompt tree.
    pub root: PathBuf,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
    /// File logging is disabled when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl VaultConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        Self {
            root: read(ENV_ROOT).map(PathBuf::from).unwrap_or(defaults.root),
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    /// Starts file logging when `log_dir` is configured.
    ///
    /// Returns `Ok(false)` when file logging is disabled.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        match &self.log_dir {
            Some(dir) => init_logging(&self.log_level, dir).map(|()| true),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{VaultConfig, ENV_LOG_DIR, ENV_LOG_LEVEL, ENV_ROOT};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn lookup_overrides_defaults_and_ignores_blank_values() {
        let env = HashMap::from([
            (ENV_ROOT, "/srv/prompts".to_string()),
            (ENV_LOG_LEVEL, "  ".to_string()),
            (ENV_LOG_DIR, "/var/log/promptvault".to_string()),
        ]);
        let config = VaultConfig::from_lookup(|key| env.get(key).cloned());

        assert_eq!(config.root, PathBuf::from("/srv/prompts"));
        assert_eq!(config.log_level, VaultConfig::default().log_level);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/promptvault")));
    }

    #[test]
    fn disabled_file_logging_is_not_an_error() {
        let config = VaultConfig::default().with_root("/tmp/unused");
        assert!(!config.init_logging().unwrap());
    }
}
