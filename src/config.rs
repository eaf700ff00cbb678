use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::matching::MIN_TITLE_SIMILARITY;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub qbittorrent: QBittorrentConfig,

    pub anilist: AnilistConfig,

    pub reddit: RedditConfig,

    pub matching: MatchingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            qbittorrent: QBittorrentConfig::default(),
            anilist: AnilistConfig::default(),
            reddit: RedditConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Directory for cached datasets such as the ID crosswalk.
    pub data_path: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 2,
            data_path: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QBittorrentConfig {
    pub url: String,

    pub username: String,

    /// Only torrents in this category are offered for playback.
    pub category: String,
}

impl Default for QBittorrentConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            username: "admin".to_string(),
            category: "anime".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnilistConfig {
    /// OAuth client id of the registered AniList application. Required
    /// for progress updates; leave empty to keep updates disabled.
    pub client_id: String,
}

impl Default for AnilistConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    /// User agent sent on Reddit requests. Reddit rejects generic agents.
    pub user_agent: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: "miru/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Similarity ratio a cleaned title pair must reach to count as the
    /// same anime, in (0, 1].
    pub min_title_similarity: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_title_similarity: MIN_TITLE_SIMILARITY,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
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
            paths.push(config_dir.join("miru").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".miru").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Path of the dotenv file holding API tokens and passwords. Secrets
    /// never live in `config.toml`.
    #[must_use]
    pub fn credentials_path() -> PathBuf {
        dirs::config_dir().map_or_else(|| PathBuf::from(".env"), |dir| dir.join("miru").join(".env"))
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.data_path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.qbittorrent.url.is_empty() {
            anyhow::bail!("qBittorrent URL cannot be empty");
        }

        let similarity = self.matching.min_title_similarity;
        if !(similarity > 0.0 && similarity <= 1.0) {
            anyhow::bail!("matching.min_title_similarity must be in (0, 1]");
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
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.qbittorrent.url, "http://localhost:8080");
        assert_eq!(config.qbittorrent.category, "anime");
        assert!((config.matching.min_title_similarity - MIN_TITLE_SIMILARITY).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[qbittorrent]"));
        assert!(toml_str.contains("[matching]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [qbittorrent]
            category = "seasonal"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.qbittorrent.category, "seasonal");

        assert_eq!(config.qbittorrent.url, "http://localhost:8080");
    }

    #[test]
    fn test_validate_rejects_bad_similarity() {
        let mut config = Config::default();
        config.matching.min_title_similarity = 0.0;
        assert!(config.validate().is_err());

        config.matching.min_title_similarity = 1.5;
        assert!(config.validate().is_err());
    }
}
