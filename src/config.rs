//! Configuration loading for the tailer daemon.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Idle wait between polls when no new data is available.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Daemon configuration, loaded from a JSON file.
///
/// Exactly one of `log-file` (single-file mode) and `log-directory` (with a
/// mandatory `file-filter`) must be set. Validation failures are fatal at
/// startup; the process never reaches readiness with a bad configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Single file to tail.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Directory to scan for rotating log files.
    #[serde(default)]
    pub log_directory: Option<PathBuf>,

    /// Regular expression matched against whole file names in
    /// `log-directory`.
    #[serde(default)]
    pub file_filter: Option<String>,

    /// Pattern applied to every raw line.
    pub regexp: String,

    /// Capture groups forwarded as records; empty means the whole match.
    #[serde(default)]
    pub regexp_groups: Vec<usize>,

    /// Emission ceiling per second; absent means unbounded.
    #[serde(default)]
    pub max_records_per_second: Option<u32>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Config {
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config {
                message: format!("cannot read {}: {e}", path.display()),
            })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("invalid configuration: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.log_file, &self.log_directory) {
            (Some(_), Some(_)) => Err(Error::Config {
                message: "log-file and log-directory are mutually exclusive".to_string(),
            }),
            (None, None) => Err(Error::Config {
                message: "either log-file or log-directory is required".to_string(),
            }),
            (None, Some(_)) if self.file_filter.is_none() => Err(Error::Config {
                message: "file-filter is required with log-directory".to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Downstream channel name, derived from the configured source.
    pub fn channel_name(&self) -> String {
        self.log_file
            .as_deref()
            .or(self.log_directory.as_deref())
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Config> {
        let config: Config = serde_json::from_str(json).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_single_file_configuration() {
        let config = parse(
            r#"{
                "log-file": "/var/log/app.log",
                "regexp": "^(\\w+)=(\\d+)$",
                "regexp-groups": [1, 2],
                "max-records-per-second": 100
            }"#,
        )
        .unwrap();

        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/app.log")));
        assert_eq!(config.regexp_groups, vec![1, 2]);
        assert_eq!(config.max_records_per_second, Some(100));
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.channel_name(), "app.log");
    }

    #[test]
    fn test_directory_configuration() {
        let config = parse(
            r#"{
                "log-directory": "/var/log/app",
                "file-filter": "app.*\\.log",
                "regexp": ".*",
                "poll-interval-ms": 250
            }"#,
        )
        .unwrap();

        assert_eq!(config.log_directory, Some(PathBuf::from("/var/log/app")));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.max_records_per_second, None);
        assert_eq!(config.channel_name(), "app");
    }

    #[test]
    fn test_source_is_required() {
        let err = parse(r#"{"regexp": ".*"}"#).unwrap_err();
        assert!(err.to_string().contains("log-file or log-directory"));
    }

    #[test]
    fn test_file_and_directory_are_exclusive() {
        let err = parse(
            r#"{
                "log-file": "/var/log/app.log",
                "log-directory": "/var/log/app",
                "file-filter": ".*",
                "regexp": ".*"
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_directory_requires_a_filter() {
        let err = parse(
            r#"{
                "log-directory": "/var/log/app",
                "regexp": ".*"
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("file-filter"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = parse(
            r#"{
                "log-file": "/var/log/app.log",
                "regexp": ".*",
                "max-batches-per-second": 5
            }"#,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_from_file_reports_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/config.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_from_file_loads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"log-file": "app.log", "regexp": "^(.*)$", "regexp-groups": [1]}"#,
        )
        .unwrap();

        let config = Config::from_file(&path).await.unwrap();
        assert_eq!(config.regexp, "^(.*)$");
        assert_eq!(config.regexp_groups, vec![1]);
    }
}
