//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via TASKBRIDGE_CONFIG or --config)
//! 3. Environment variables
//!
//! The Todoist API token is never part of the file; it is read from
//! `TODOIST_API_TOKEN` at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use taskbridge_todoist::TodoistConfig;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Request handling configuration.
    pub server: ServerSettings,
    /// Todoist endpoint configuration.
    pub todoist: TodoistSettings,
}

impl Config {
    /// Loads configuration from an optional file, then applies environment
    /// variable overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(&|key: &str| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary variable source.
    fn apply_overrides(&mut self, vars: &dyn Fn(&str) -> Option<String>) {
        self.server.apply_overrides(vars);
        self.todoist.apply_overrides(vars);
    }

    /// Checks that values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "server.tool_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.todoist.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "todoist.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !self.todoist.base_url.starts_with("http://")
            && !self.todoist.base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "todoist.base_url must be an http(s) URL, got '{}'",
                self.todoist.base_url
            )));
        }
        Ok(())
    }

    /// Builds the Todoist client configuration for the given token.
    pub fn todoist_config(&self, api_token: impl Into<String>) -> TodoistConfig {
        TodoistConfig::new(api_token)
            .with_base_url(self.todoist.base_url.clone())
            .with_request_timeout(self.todoist.request_timeout())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Request handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Upper bound on a single tool invocation, in seconds.
    pub tool_timeout_secs: u64,
    /// Time in-flight requests get to finish after stdin closes, in seconds.
    pub shutdown_grace_secs: u64,
    /// Size of each stdin read.
    pub read_buffer_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            shutdown_grace_secs: 5,
            read_buffer_size: 8 * 1024,
        }
    }
}

impl ServerSettings {
    fn apply_overrides(&mut self, vars: &dyn Fn(&str) -> Option<String>) {
        if let Some(secs) = vars("TASKBRIDGE_TOOL_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.tool_timeout_secs = secs;
        }

        if let Some(secs) = vars("TASKBRIDGE_SHUTDOWN_GRACE_SECS").and_then(|v| v.parse().ok()) {
            self.shutdown_grace_secs = secs;
        }

        if let Some(size) = vars("TASKBRIDGE_READ_BUFFER_SIZE").and_then(|v| v.parse().ok()) {
            self.read_buffer_size = size;
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Returns the read buffer size clamped to a sane range.
    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
            .clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE)
    }
}

/// Todoist endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoistSettings {
    /// REST API base URL.
    pub base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for TodoistSettings {
    fn default() -> Self {
        Self {
            base_url: taskbridge_todoist::config::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 15,
        }
    }
}

impl TodoistSettings {
    fn apply_overrides(&mut self, vars: &dyn Fn(&str) -> Option<String>) {
        if let Some(url) = vars("TODOIST_API_URL") {
            if !url.is_empty() {
                self.base_url = url;
            }
        }

        if let Some(secs) = vars("TODOIST_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = secs;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file {}: {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file {}: {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "invalid configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.tool_timeout(), Duration::from_secs(30));
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.server.read_buffer_size(), 8192);
        assert_eq!(config.todoist.base_url, "https://api.todoist.com/rest/v2");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(&vars(&[
            ("TASKBRIDGE_TOOL_TIMEOUT_SECS", "3"),
            ("TASKBRIDGE_SHUTDOWN_GRACE_SECS", "1"),
            ("TODOIST_API_URL", "http://127.0.0.1:9000"),
            ("TODOIST_REQUEST_TIMEOUT_SECS", "2"),
        ]));

        assert_eq!(config.server.tool_timeout_secs, 3);
        assert_eq!(config.server.shutdown_grace_secs, 1);
        assert_eq!(config.todoist.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.todoist.request_timeout_secs, 2);
    }

    #[test]
    fn test_unparseable_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(&vars(&[("TASKBRIDGE_TOOL_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.server.tool_timeout_secs, 30);
    }

    #[test]
    fn test_read_buffer_size_clamped() {
        let mut settings = ServerSettings {
            read_buffer_size: 1,
            ..Default::default()
        };
        assert_eq!(settings.read_buffer_size(), MIN_READ_BUFFER_SIZE);

        settings.read_buffer_size = usize::MAX;
        assert_eq!(settings.read_buffer_size(), MAX_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.server.tool_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = Config::default();
        config.todoist.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  tool_timeout_secs: 10").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.tool_timeout_secs, 10);
        // Unspecified fields keep their defaults
        assert_eq!(config.server.shutdown_grace_secs, 5);
        assert_eq!(config.todoist.request_timeout_secs, 15);
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/nonexistent/taskbridge.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_, _))));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "server: [unclosed").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_, _))));
    }

    #[test]
    fn test_save_and_reload() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.todoist.request_timeout_secs = 7;
        config.save(file.path()).unwrap();

        let reloaded = Config::from_file(file.path()).unwrap();
        assert_eq!(reloaded.todoist.request_timeout_secs, 7);
    }

    #[test]
    fn test_todoist_config() {
        let mut config = Config::default();
        config.todoist.base_url = "http://localhost:1234/".to_string();
        config.todoist.request_timeout_secs = 4;

        let todoist = config.todoist_config("token");
        assert_eq!(todoist.base_url, "http://localhost:1234");
        assert_eq!(todoist.request_timeout, Duration::from_secs(4));
        assert_eq!(todoist.api_token, "token");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ValidationError("bad".to_string());
        assert_eq!(err.to_string(), "invalid configuration: bad");
    }
}
