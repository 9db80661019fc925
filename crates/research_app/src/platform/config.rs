//! Client configuration: an optional RON file, overridden by CLI flags.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use research_engine::{EngineSettings, DEFAULT_REPORT_URL, DEFAULT_WS_URL};
use research_logging::LogDestination;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "research.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unknown log level {0:?}")]
    InvalidLevel(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub ws_url: String,
    pub report_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// How long to wait for a trailing report once a job has settled while
    /// its connection is still open.
    pub linger_ms: u64,
    pub log_destination: LogDestination,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            report_url: DEFAULT_REPORT_URL.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 600,
            linger_ms: 2000,
            log_destination: LogDestination::Terminal,
            log_level: "warn".to_string(),
        }
    }
}

impl ClientConfig {
    /// Loads `path`. A missing file yields defaults unless `required` is set.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        ron::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(self.log_level.trim())
            .map_err(|_| ConfigError::InvalidLevel(self.log_level.clone()))
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            ws_url: self.ws_url.clone(),
            report_url: self.report_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("absent.ron"), false).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(&dir.path().join("absent.ron"), true).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"(ws_url: "ws://research.internal:9000/ws", log_destination: both, log_level: "debug")"#,
        )
        .unwrap();

        let config = ClientConfig::load(&path, true).unwrap();
        assert_eq!(config.ws_url, "ws://research.internal:9000/ws");
        assert_eq!(config.log_destination, LogDestination::Both);
        assert_eq!(config.level_filter().unwrap(), LevelFilter::Debug);
        assert_eq!(config.report_url, DEFAULT_REPORT_URL);

        let settings = config.engine_settings();
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.ws_url, config.ws_url);
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "(ws_url: 42").unwrap();

        let err = ClientConfig::load(&path, false).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let config = ClientConfig {
            log_level: "chatty".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.level_filter(),
            Err(ConfigError::InvalidLevel(level)) if level == "chatty"
        ));
    }
}
