use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub remote_store: RemoteStoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Optional path to a TOML roster file. When unset, the built-in
    /// provisioned roster is used.
    pub directory_path: Option<String>,

    /// The single user id allowed into the administrative reset flow.
    pub admin_user_id: String,

    /// Recognized local-development context: credential resolution skips the
    /// remote store entirely and goes straight to cache -> default.
    pub local_dev: bool,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/keystone.db".to_string(),
            log_level: "info".to_string(),
            directory_path: None,
            admin_user_id: "kim-mu-bin".to_string(),
            local_dev: false,
            max_db_connections: 5,
            min_db_connections: 1,
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6710,
            cors_allowed_origins: vec![
                "http://localhost:6710".to_string(),
                "http://127.0.0.1:6710".to_string(),
            ],
            secure_cookies: true,
            metrics_enabled: true,
        }
    }
}

/// Remote credential store (PostgREST-style key-value API).
///
/// The store is optional: an empty `url` or `api_key` means "unconfigured",
/// which the resolver treats identically to unreachable. The `tables` list is
/// tried in order on every read and write; deployments have drifted between
/// schema names, so the first table that answers wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteStoreConfig {
    pub url: String,

    pub api_key: String,

    /// Candidate table names, most preferred first.
    pub tables: Vec<String>,

    /// Request timeout in seconds (default: 10)
    pub request_timeout_seconds: u64,
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            tables: vec![
                "password_changes".to_string(),
                // Misspelled twin left behind by an early deployment; some
                // environments only have this one.
                "password_ghanges".to_string(),
            ],
            request_timeout_seconds: 10,
        }
    }
}

impl RemoteStoreConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.api_key.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            remote_store: RemoteStoreConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                let mut config = Self::load_from_path(path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Remote store credentials come from the environment when present,
    /// matching how the hosted deployment provisions them.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("KEYSTONE_REMOTE_STORE_URL") {
            self.remote_store.url = url;
        }
        if let Ok(key) = std::env::var("KEYSTONE_REMOTE_STORE_KEY") {
            self.remote_store.api_key = key;
        }
        if let Ok(local_dev) = std::env::var("KEYSTONE_LOCAL_DEV") {
            self.general.local_dev = matches!(local_dev.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("keystone").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".keystone").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.admin_user_id.is_empty() {
            anyhow::bail!("admin_user_id cannot be empty");
        }

        if self.remote_store.is_configured() && self.remote_store.tables.is_empty() {
            anyhow::bail!("Remote store is configured but has no candidate tables");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.admin_user_id, "kim-mu-bin");
        assert!(!config.general.local_dev);
        assert_eq!(
            config.remote_store.tables,
            vec!["password_changes", "password_ghanges"]
        );
        assert!(!config.remote_store.is_configured());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[remote_store]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"
            local_dev = true

            [remote_store]
            url = "https://example.supabase.co"
            api_key = "anon-key"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert!(config.general.local_dev);
        assert!(config.remote_store.is_configured());

        assert_eq!(config.server.port, 6710);
    }

    #[test]
    fn test_validate_rejects_empty_table_list() {
        let mut config = Config::default();
        config.remote_store.url = "https://example.supabase.co".to_string();
        config.remote_store.api_key = "anon-key".to_string();
        config.remote_store.tables.clear();
        assert!(config.validate().is_err());
    }
}
