//! Configuration loaded from `ocr-batch.toml`.
//!
//! [`Config`] holds every tunable of a batch run. Values missing from the
//! file fall back to defaults. The `SERVER_URL` and `API_KEY` environment
//! variables take precedence over the file; CLI flags take precedence over
//! both. The struct is built once in `main` and passed by reference.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::api::OutputFormat;
use crate::error::BatchError;

/// Default file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ocr-batch.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the OCR service.
    #[serde(default)]
    pub server_url: String,

    /// Static key sent in the `api-key` header.
    #[serde(default)]
    pub api_key: String,

    /// Seconds between two status queries while the job is still running.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds between two download retry rounds.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,

    /// Seconds between two submission attempts.
    #[serde(default = "default_submit_retry_interval_secs")]
    pub submit_retry_interval_secs: u64,

    #[serde(default = "default_primary_format")]
    pub primary_format: OutputFormat,

    /// Downloaded best-effort after each primary success.
    #[serde(default)]
    pub secondary_format: Option<OutputFormat>,

    /// Upper bound on download retry rounds. Files still queued afterwards
    /// are reported as unprocessed.
    #[serde(default = "default_max_retry_rounds")]
    pub max_retry_rounds: u32,

    /// Ignore `max_retry_rounds` and wait for a slow backend indefinitely.
    #[serde(default)]
    pub retry_forever: bool,

    /// Upper bound on submission attempts. `None` retries forever.
    #[serde(default)]
    pub max_submit_attempts: Option<u32>,

    /// Root of the output tree; one subdirectory per job.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Recognition of a large batch takes a long time: 20 minutes between polls.
fn default_poll_interval_secs() -> u64 {
    20 * 60
}

fn default_retry_interval_secs() -> u64 {
    10 * 60
}

fn default_submit_retry_interval_secs() -> u64 {
    60
}

fn default_primary_format() -> OutputFormat {
    OutputFormat::Txt
}

// 72 rounds at the default interval is 12 hours.
fn default_max_retry_rounds() -> u32 {
    72
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("OCRs")
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            api_key: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            retry_interval_secs: default_retry_interval_secs(),
            submit_retry_interval_secs: default_submit_retry_interval_secs(),
            primary_format: default_primary_format(),
            secondary_format: None,
            max_retry_rounds: default_max_retry_rounds(),
            retry_forever: false,
            max_submit_attempts: None,
            output_dir: default_output_dir(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, then
    /// apply environment overrides. An explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, BatchError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, BatchError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BatchError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(toml::from_str::<Config>(&contents)?)
    }

    /// Environment variables take precedence over the file for the
    /// connection settings.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SERVER_URL").filter(|v| !v.is_empty()) {
            self.server_url = url;
        }
        if let Some(key) = lookup("API_KEY").filter(|v| !v.is_empty()) {
            self.api_key = key;
        }
    }

    /// Reject configurations that would make a run pointless. Called once at startup.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.server_url.trim().is_empty() {
            return Err(BatchError::Config(
                "server_url is not set (config file or SERVER_URL)".into(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(BatchError::Config(
                "api_key is not set (config file or API_KEY)".into(),
            ));
        }
        if self.secondary_format == Some(self.primary_format) {
            return Err(BatchError::Config(format!(
                "secondary_format must differ from primary_format ({})",
                self.primary_format
            )));
        }
        for (name, secs) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("retry_interval_secs", self.retry_interval_secs),
            ("submit_retry_interval_secs", self.submit_retry_interval_secs),
        ] {
            if secs == 0 {
                return Err(BatchError::Config(format!("{name} must be positive")));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(BatchError::Config("request_timeout_secs must be positive".into()));
        }
        if self.max_submit_attempts == Some(0) {
            return Err(BatchError::Config("max_submit_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Effective retry-round bound, `None` when unbounded.
    pub fn retry_round_limit(&self) -> Option<u32> {
        if self.retry_forever {
            None
        } else {
            Some(self.max_retry_rounds)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn submit_retry_interval(&self) -> Duration {
        Duration::from_secs(self.submit_retry_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid() -> Config {
        Config {
            server_url: "https://ocr.example.org".into(),
            api_key: "k".into(),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 1200);
        assert_eq!(config.retry_interval_secs, 600);
        assert_eq!(config.submit_retry_interval_secs, 60);
        assert_eq!(config.primary_format, OutputFormat::Txt);
        assert_eq!(config.secondary_format, None);
        assert_eq!(config.max_retry_rounds, 72);
        assert_eq!(config.retry_round_limit(), Some(72));
        assert_eq!(config.max_submit_attempts, None);
        assert_eq!(config.output_dir, PathBuf::from("OCRs"));
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            server_url = "https://ocr.example.org"
            api_key = "k-123"
            secondary_format = "alto"
            retry_interval_secs = 30
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key, "k-123");
        assert_eq!(config.secondary_format, Some(OutputFormat::Alto));
        assert_eq!(config.retry_interval(), Duration::from_secs(30));
        assert_eq!(config.poll_interval_secs, 1200);
        assert_eq!(config.primary_format, OutputFormat::Txt);
    }

    #[test]
    fn unknown_format_fails_to_parse() {
        let result = toml::from_str::<Config>(r#"primary_format = "pdf""#);
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: Config = toml::from_str(
            r#"
            server_url = "https://file.example.org"
            api_key = "from-file"
        "#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = [("API_KEY", "from-env"), ("SERVER_URL", "")].into();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.api_key, "from-env");
        // Empty variables do not clobber the file.
        assert_eq!(config.server_url, "https://file.example.org");
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "poll_interval_secs = 5\nmax_retry_rounds = 3\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.max_retry_rounds, 3);
    }

    #[test]
    fn retry_forever_lifts_the_round_limit() {
        let config: Config = toml::from_str("retry_forever = true\nmax_retry_rounds = 3\n").unwrap();
        assert_eq!(config.retry_round_limit(), None);
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(BatchError::Config(_))));
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_requires_connection_settings() {
        let mut config = valid();
        config.server_url.clear();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.api_key = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_formats() {
        let config = Config {
            secondary_format: Some(OutputFormat::Txt),
            ..valid()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("secondary_format"));
    }

    #[test]
    fn validate_rejects_zero_submit_attempts() {
        let config = Config {
            max_submit_attempts: Some(0),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let config = Config {
            poll_interval_secs: 0,
            ..valid()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Config error: poll_interval_secs must be positive");

        let config = Config {
            retry_interval_secs: 0,
            ..valid()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Config error: retry_interval_secs must be positive");

        let config = Config {
            submit_retry_interval_secs: 0,
            ..valid()
        };
        assert!(config.validate().is_err());
    }
}
