//! Engine configuration, loaded from TOML

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Concurrent workers
    pub workers: usize,
    /// Directory receiving tool report files
    pub reports_dir: PathBuf,
    /// Timeout for tools that declare none, in seconds
    pub default_timeout_secs: Option<u64>,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub json_logs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            reports_dir: std::env::temp_dir().join("strix-reports"),
            default_timeout_secs: Some(3600),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl EngineConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(source).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Set the worker count
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the reports directory
    #[inline]
    #[must_use]
    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = dir.into();
        self
    }

    /// Default tool timeout
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.workers == 0 {
            return Err(EngineError::Config("workers must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml_str("workers = 8\njson_logs = true\n").unwrap();
        assert_eq!(config.workers, 8);
        assert!(config.json_logs);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_rejects_zero_workers_and_unknown_keys() {
        assert!(EngineConfig::from_toml_str("workers = 0").is_err());
        assert!(EngineConfig::from_toml_str("threads = 2").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reports_dir = \"/var/lib/strix\"\ndefault_timeout_secs = 60").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.reports_dir, PathBuf::from("/var/lib/strix"));
        assert_eq!(config.default_timeout(), Some(Duration::from_secs(60)));
    }
}
