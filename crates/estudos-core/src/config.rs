use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result, anyhow};

use crate::api::Endpoints;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Overrides `base_url` from the config file
pub const BASE_URL_ENV: &str = "ESTUDOS_BASE_URL";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub base_url: Option<String>,
    #[serde(default)]
    pub endpoints: Endpoints,
    pub request_timeout_secs: Option<u64>,
    /// Hex color of the header bar, e.g. "#007bff"
    pub accent_color: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Backend base URL: environment first, then the config file
    pub fn base_url(&self) -> String {
        self.base_url_with(std::env::var(BASE_URL_ENV).ok())
    }

    fn base_url_with(&self, env_override: Option<String>) -> String {
        env_override
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// HTTP client shared by the backend clients
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout() {
            builder = builder.timeout(timeout);
        }
        builder.build().context("building HTTP client")
    }

    /// `<config_dir>/estudos`, home of the config, preferences, and log
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("estudos"))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.base_url_with(None), DEFAULT_BASE_URL);
        assert_eq!(config.endpoints, Endpoints::default());
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.base_url = Some("http://study.local".to_string());
        config.request_timeout_secs = Some(30);
        config.endpoints.contexts = "/api/folders".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.base_url_with(None), "http://study.local");
        assert_eq!(loaded.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(loaded.endpoints.contexts, "/api/folders");
        assert_eq!(loaded.endpoints.chat, "/api/chat");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::new();
        config.base_url = Some("http://from-file".to_string());

        assert_eq!(config.base_url_with(Some("http://from-env".to_string())), "http://from-env");
        assert_eq!(config.base_url_with(Some("  ".to_string())), "http://from-file");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let config = Config {
            request_timeout_secs: Some(0),
            ..Config::default()
        };
        assert!(config.request_timeout().is_none());
    }
}
