//! Configuration management for the relay daemon.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default port for the admin HTTP listener (registration, lookup).
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Default port for the WebSocket message transport.
pub const DEFAULT_WS_PORT: u16 = 6060;

/// Main daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Admin HTTP listener port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// WebSocket transport listener port.
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    /// Shared secret required on every command; disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
    /// Override for the message database path; defaults to `<base>/relay.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_ws_port() -> u16 {
    DEFAULT_WS_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            ws_port: DEFAULT_WS_PORT,
            auth_key: None,
            database_path: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file under `paths`, falling back
    /// to defaults. Environment variables override file values.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file under `paths`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Resolve the message database path.
    pub fn database_path(&self, paths: &Paths) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| paths.database_file())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("RELAY_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(port) = env_port("RELAY_HTTP_PORT") {
            self.http_port = port;
        }
        if let Some(port) = env_port("RELAY_WS_PORT") {
            self.ws_port = port;
        }
        if let Ok(key) = std::env::var("RELAY_AUTH_KEY") {
            let trimmed = key.trim();
            if !trimmed.is_empty() {
                self.auth_key = Some(trimmed.to_string());
            }
        }
    }
}

fn env_port(name: &str) -> Option<u16> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.ws_port, DEFAULT_WS_PORT);
        assert!(config.auth_key.is_none());
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "ws_port": 7070,
            "auth_key": "sekrit"
        }"#;

        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.ws_port, 7070);
        // Unset fields keep their defaults
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.auth_key.as_deref(), Some("sekrit"));
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.log_level = "trace".to_string();
        config.http_port = 9000;

        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.log_level, "trace");
        assert_eq!(loaded.http_port, 9000);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.ws_port, DEFAULT_WS_PORT);
    }

    #[test]
    fn test_database_path_default_and_override() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/relay-base"));

        let config = Config::default();
        assert_eq!(
            config.database_path(&paths),
            PathBuf::from("/tmp/relay-base/relay.db")
        );

        let mut config = Config::default();
        config.database_path = Some(PathBuf::from("/var/lib/relay/messages.db"));
        assert_eq!(
            config.database_path(&paths),
            PathBuf::from("/var/lib/relay/messages.db")
        );
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{not valid").unwrap();

        assert!(Config::load_from_file(&config_path).is_err());
    }
}
