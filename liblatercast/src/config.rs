//! Configuration management for Latercast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub oauth: OauthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Root directory for stored media objects
    pub root: String,
    /// Public base URL recorded in draft `media_url` fields
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Authorization endpoint of the identity provider
    pub auth_url: String,
    /// Token endpoint of the identity provider
    pub token_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/youtube.upload".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Maximum candidate drafts fetched per tick
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
    /// Maximum drafts processed concurrently within one tick
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Timeout around one per-draft publish attempt
    #[serde(default = "default_per_draft_timeout")]
    pub per_draft_timeout_secs: u64,
    /// A pending draft older than this many ticks is treated as crashed
    /// mid-publish and rolled back
    #[serde(default = "default_reclaim_ticks")]
    pub pending_reclaim_ticks: u32,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_scan_limit() -> u32 {
    500
}

fn default_max_concurrency() -> usize {
    4
}

fn default_per_draft_timeout() -> u64 {
    600
}

fn default_reclaim_ticks() -> u32 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            scan_limit: default_scan_limit(),
            max_concurrency: default_max_concurrency(),
            per_draft_timeout_secs: default_per_draft_timeout(),
            pending_reclaim_ticks: default_reclaim_ticks(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/latercast/drafts.db".to_string(),
            },
            media: MediaConfig {
                root: "~/.local/share/latercast/media".to_string(),
                base_url: "file:///~/.local/share/latercast/media".to_string(),
            },
            oauth: OauthConfig {
                client_id: String::new(),
                client_secret: String::new(),
                redirect_uri: "http://localhost:8080/oauth/callback".to_string(),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                scopes: default_scopes(),
            },
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("LATERCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("latercast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("latercast"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [database]
            path = "/tmp/latercast/drafts.db"

            [media]
            root = "/tmp/latercast/media"
            base_url = "https://media.example.com"

            [oauth]
            client_id = "client"
            client_secret = "secret"
            redirect_uri = "http://localhost:8080/cb"
            auth_url = "https://idp.example.com/auth"
            token_url = "https://idp.example.com/token"

            [scheduler]
            poll_interval = 30
            scan_limit = 100
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database.path, "/tmp/latercast/drafts.db");
        assert_eq!(config.media.base_url, "https://media.example.com");
        assert_eq!(config.scheduler.poll_interval, 30);
        assert_eq!(config.scheduler.scan_limit, 100);
        // Unset scheduler fields fall back to defaults
        assert_eq!(config.scheduler.max_concurrency, 4);
        assert_eq!(config.scheduler.pending_reclaim_ticks, 10);
        // Default scope applies when omitted
        assert_eq!(config.oauth.scopes.len(), 1);
    }

    #[test]
    fn test_scheduler_section_optional() {
        let toml_str = r#"
            [database]
            path = "/tmp/drafts.db"

            [media]
            root = "/tmp/media"
            base_url = "https://media.example.com"

            [oauth]
            client_id = "client"
            client_secret = "secret"
            redirect_uri = "http://localhost:8080/cb"
            auth_url = "https://idp.example.com/auth"
            token_url = "https://idp.example.com/token"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.poll_interval, 60);
        assert_eq!(config.scheduler.scan_limit, 500);
    }

    #[test]
    fn test_default_config_is_complete() {
        let config = Config::default_config();
        assert!(!config.database.path.is_empty());
        assert!(!config.media.root.is_empty());
        assert!(!config.oauth.token_url.is_empty());
        assert_eq!(config.scheduler.poll_interval, 60);
    }
}
