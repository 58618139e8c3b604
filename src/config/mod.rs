mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use loader::load_config;

/// Fixed upstream chat-completions endpoint
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Fixed model identifier sent with every upstream request
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Environment variable supplying the upstream API credential
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Proxy server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8090
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Upstream chat-completion service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Chat-completions endpoint URL
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,
    /// API credential; when absent here, the OPENAI_API_KEY environment
    /// variable is consulted at load time. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout() -> u64 {
    300
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            model: default_model(),
            api_key: None,
            timeout_seconds: default_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Load configuration, falling back to defaults when no file exists.
    ///
    /// The upstream credential is merged in from the environment when the
    /// file does not carry one; all later code takes it from the returned
    /// config rather than reading the environment again.
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_paths = ["config.yaml", "config.yml"];
                match default_paths.iter().map(Path::new).find(|p| p.exists()) {
                    Some(path) => Self::from_file(path)?,
                    None => AppConfig::default(),
                }
            }
        };

        if config.upstream.api_key.is_none() {
            config.upstream.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }

        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.upstream.model, DEFAULT_MODEL);
        assert!(config.upstream.api_key.is_none());
        assert_eq!(config.upstream.timeout_seconds, 300);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = UpstreamConfig {
            api_key: Some("sk-secret".to_string()),
            ..UpstreamConfig::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("sk-secret"));
    }

    #[test]
    fn test_from_file_missing() {
        let result = AppConfig::from_file("/nonexistent/config.yaml");
        assert!(matches!(result.unwrap_err(), ConfigError::NotFound(_)));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::NotFound("test.yaml".to_string());
        assert!(err.to_string().contains("test.yaml"));
    }
}
