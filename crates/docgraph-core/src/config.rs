use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::status::DEFAULT_STATUS_DURATION;

pub const DEFAULT_API_URL: &str = "http://localhost/api";
pub const API_URL_ENV: &str = "DOCGRAPH_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub api_url: Option<String>,
    pub status_duration_ms: Option<u64>,
    pub physics_enabled: Option<bool>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_url: None,
            status_duration_ms: None,
            physics_enabled: Some(true),
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", config_path.display(), e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Remember the physics toggle between runs.
    pub fn save_physics(enabled: bool) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.physics_enabled = Some(enabled);
        config.save()
    }

    /// Environment first, then the config file, then the default.
    pub fn api_base_url(&self) -> String {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                return url.trim().to_string();
            }
        }
        self.api_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn status_duration(&self) -> Duration {
        self.status_duration_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_STATUS_DURATION)
    }

    pub fn physics(&self) -> bool {
        self.physics_enabled.unwrap_or(true)
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("docgraph").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert!(config.physics());
        assert_eq!(config.status_duration(), DEFAULT_STATUS_DURATION);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_url: Some("http://graph.internal:8000/api".to_string()),
            status_duration_ms: Some(2500),
            physics_enabled: Some(false),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.status_duration(), Duration::from_millis(2500));
        assert!(!loaded.physics());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"status_duration_ms": 1000}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_url, None);
        assert!(loaded.physics());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_blank_api_url_uses_default() {
        let config = Config {
            api_url: Some("  ".to_string()),
            ..Config::new()
        };
        if std::env::var(API_URL_ENV).is_err() {
            assert_eq!(config.api_base_url(), DEFAULT_API_URL);
        }
    }
}
