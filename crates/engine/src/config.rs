//! Engine and server configuration.
//!
//! Read from a TOML file. A missing file yields the defaults; a file that
//! exists but does not parse is an error, so a typo never silently turns
//! into default settings.
//!
//! ```toml
//! bind = "0.0.0.0:3000"
//! database_url = "postgres://localhost/rusty_flow"
//!
//! [engine]
//! max_concurrent_nodes = 32
//! default_execution_timeout_ms = 600000
//!
//! [engine.default_retry]
//! maxAttempts = 3
//! baseDelayMs = 200
//! maxDelayMs = 10000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Tuning knobs for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of the worker pool shared by every execution.
    pub max_concurrent_nodes: usize,
    /// Deadline for executions whose definition sets none.
    pub default_execution_timeout_ms: u64,
    /// Retry policy for nodes that declare none.
    pub default_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_nodes: 16,
            default_execution_timeout_ms: 30 * 60 * 1000,
            default_retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn default_execution_timeout(&self) -> Duration {
        Duration::from_millis(self.default_execution_timeout_ms)
    }
}

/// Settings for `rusty-flow serve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Postgres URL; the in-memory store is used when absent.
    pub database_url: Option<String>,
    pub max_db_connections: u32,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".into(),
            database_url: None,
            max_db_connections: 10,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = ServerConfig::load(&tmp.path().join("rusty-flow.toml")).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.engine.max_concurrent_nodes, 16);
        assert_eq!(config.engine.default_retry.max_attempts, 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rusty-flow.toml");
        std::fs::write(
            &path,
            r#"
bind = "127.0.0.1:8080"

[engine]
max_concurrent_nodes = 4

[engine.default_retry]
maxAttempts = 5
"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert!(config.database_url.is_none());
        assert_eq!(config.engine.max_concurrent_nodes, 4);
        assert_eq!(config.engine.default_retry.max_attempts, 5);
        assert_eq!(config.engine.default_retry.base_delay_ms, 100);
        assert_eq!(config.engine.default_execution_timeout_ms, 30 * 60 * 1000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rusty-flow.toml");
        std::fs::write(&path, "bind = [").unwrap();
        assert!(matches!(ServerConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
