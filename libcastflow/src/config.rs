//! Configuration management for Cast Flow
//!
//! Configuration is read once from a TOML file, with secrets optionally
//! supplied through the environment, and then passed explicitly to the
//! components that need it.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

pub const DEFAULT_NEYNAR_BASE_URL: &str = "https://api.neynar.com";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub neynar: NeynarConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/cast-flow/casts.db".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NeynarConfig {
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for NeynarConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// Upper bound on a single publish call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Delay between batches when `cast-send` runs as a daemon
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token the external scheduler must present on the cron route
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub cron_secret: Option<SecretString>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cron_secret: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_NEYNAR_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    300
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .filter(|s| !s.trim().is_empty())
        .map(SecretString::from))
}

impl Config {
    /// Load configuration from the default location
    ///
    /// `NEYNAR_API_KEY`, `CRON_SECRET` and `CAST_FLOW_DB_PATH` override the
    /// corresponding file values when set.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = Self::load_from_path(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("NEYNAR_API_KEY") {
            self.neynar.api_key = Some(SecretString::from(key));
        }
        if let Some(secret) = non_empty("CRON_SECRET") {
            self.server.cron_secret = Some(SecretString::from(secret));
        }
        if let Some(path) = non_empty("CAST_FLOW_DB_PATH") {
            self.database.path = path;
        }
    }

    /// The Neynar API key, required by anything that publishes
    pub fn neynar_api_key(&self) -> Result<&SecretString> {
        self.neynar
            .api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("neynar.api_key".to_string()).into())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CAST_FLOW_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("cast-flow").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CastFlowError;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::collections::HashMap;

    #[test]
    fn test_full_config_parses() {
        let config = Config::from_toml(
            r#"
[database]
path = "/tmp/casts.db"

[neynar]
api_key = "neynar-key"
base_url = "http://localhost:9999"

[publisher]
request_timeout_secs = 5
poll_interval_secs = 60

[server]
bind = "0.0.0.0:8080"
cron_secret = "s3cret"
"#,
        )
        .unwrap();

        assert_eq!(config.database.path, "/tmp/casts.db");
        assert_eq!(config.neynar.base_url, "http://localhost:9999");
        assert_eq!(config.neynar_api_key().unwrap().expose_secret(), "neynar-key");
        assert_eq!(config.publisher.request_timeout_secs, 5);
        assert_eq!(config.publisher.poll_interval_secs, 60);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(
            config.server.cron_secret.as_ref().unwrap().expose_secret(),
            "s3cret"
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.neynar.base_url, DEFAULT_NEYNAR_BASE_URL);
        assert_eq!(config.publisher.request_timeout_secs, 30);
        assert_eq!(config.publisher.poll_interval_secs, 300);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert!(config.server.cron_secret.is_none());
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = Config::from_toml("").unwrap();
        match config.neynar_api_key() {
            Err(CastFlowError::Config(ConfigError::MissingField(field))) => {
                assert_eq!(field, "neynar.api_key")
            }
            other => panic!("Expected MissingField, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_blank_secret_is_treated_as_absent() {
        let config = Config::from_toml("[server]\ncron_secret = \"  \"\n").unwrap();
        assert!(config.server.cron_secret.is_none());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = Config::from_toml("[neynar]\napi_key = \"from-file\"\n").unwrap();
        let env: HashMap<&str, &str> = [
            ("NEYNAR_API_KEY", "from-env"),
            ("CRON_SECRET", "cron-env"),
            ("CAST_FLOW_DB_PATH", "/tmp/override.db"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.neynar_api_key().unwrap().expose_secret(), "from-env");
        assert_eq!(
            config.server.cron_secret.as_ref().unwrap().expose_secret(),
            "cron-env"
        );
        assert_eq!(config.database.path, "/tmp/override.db");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = Config::from_toml("invalid toml content [[[");
        assert!(matches!(
            result,
            Err(CastFlowError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_honours_env() {
        std::env::set_var("CAST_FLOW_CONFIG", "/tmp/cast-flow-test/config.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("CAST_FLOW_CONFIG");
        assert_eq!(path, PathBuf::from("/tmp/cast-flow-test/config.toml"));
    }

    #[test]
    #[serial]
    fn test_load_reads_file_and_env() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[database]\npath = \"/tmp/from-file.db\"\n").unwrap();

        std::env::set_var("CAST_FLOW_CONFIG", config_path.to_str().unwrap());
        std::env::set_var("NEYNAR_API_KEY", "env-key");
        let config = Config::load();
        std::env::remove_var("CAST_FLOW_CONFIG");
        std::env::remove_var("NEYNAR_API_KEY");

        let config = config.unwrap();
        assert_eq!(config.database.path, "/tmp/from-file.db");
        assert_eq!(config.neynar_api_key().unwrap().expose_secret(), "env-key");
    }
}
