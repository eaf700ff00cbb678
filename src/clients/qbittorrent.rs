use std::path::Path;

use anyhow::{bail, Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::http::USER_AGENT;
use crate::constants::VIDEO_EXTENSIONS;
use crate::models::EpisodeIdentity;
use crate::parser::parse_filename;

/// Connection settings for the qBittorrent Web API. The password comes
/// out of the credential store, not `config.toml`.
#[derive(Debug, Clone)]
pub struct QBitConnection {
    pub base_url: String,

    pub username: String,

    pub password: String,

    /// Only torrents in this category are considered.
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentInfo {
    pub hash: String,

    pub name: String,

    pub save_path: String,

    #[serde(default)]
    pub category: String,
}

fn missing_index() -> i32 {
    -1
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentFile {
    /// Older servers omit this field; [`fill_missing_indexes`] falls
    /// back to the array position then.
    #[serde(default = "missing_index")]
    pub index: i32,

    pub name: String,

    /// 0.0 to 1.0.
    pub progress: f64,

    /// 0 means "do not download", which this client uses as a soft
    /// delete marker.
    pub priority: i32,
}

fn fill_missing_indexes(files: &mut [TorrentFile]) {
    for (position, file) in files.iter_mut().enumerate() {
        if file.index < 0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            {
                file.index = position as i32;
            }
        }
    }
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[derive(Debug, Clone)]
pub struct QBittorrentClient {
    client: Client,
    config: QBitConnection,
}

impl QBittorrentClient {
    #[must_use]
    pub fn new(config: QBitConnection) -> Self {
        Self {
            client: Client::builder()
                .cookie_store(true)
                .user_agent(USER_AGENT)
                .build()
                .expect("Failed to build HTTP client"),
            config,
        }
    }

    pub async fn login(&self) -> Result<()> {
        let url = format!("{}/api/v2/auth/login", self.config.base_url);

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .header("Referer", &self.config.base_url)
            .form(&params)
            .send()
            .await
            .context("Failed to connect to qBittorrent")?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::OK && body.contains("Ok") {
            debug!("Successfully authenticated with qBittorrent");

            Ok(())
        } else if body.contains("Fails") {
            bail!("qBittorrent authentication failed: invalid credentials")
        } else {
            bail!("qBittorrent authentication failed: status={status}, body={body}")
        }
    }

    async fn ensure_auth(&self) -> Result<()> {
        let url = format!("{}/api/v2/app/version", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .header("Referer", &self.config.base_url)
            .send()
            .await?;

        if response.status() == StatusCode::FORBIDDEN {
            debug!(reason = "session_expired", "Logging in...");
            self.login().await?;
        }

        Ok(())
    }

    /// Torrents in the configured category, sorted by name.
    pub async fn get_torrents(&self) -> Result<Vec<TorrentInfo>> {
        self.ensure_auth().await?;

        let base_url = format!("{}/api/v2/torrents/info", self.config.base_url);
        let mut url = Url::parse(&base_url)?;
        url.query_pairs_mut()
            .append_pair("category", &self.config.category)
            .append_pair("sort", "name");

        let response = self
            .client
            .get(url)
            .header("Referer", &self.config.base_url)
            .send()
            .await?;

        let text = response.text().await?;
        let torrents: Vec<TorrentInfo> = serde_json::from_str(&text).map_err(|e| {
            let truncated = if text.len() > 1000 {
                format!("{}...", &text[..1000])
            } else {
                text
            };
            debug!(error = %e, response = %truncated, "Failed to parse qBittorrent response");
            anyhow::anyhow!("Failed to parse response: {e}")
        })?;
        Ok(torrents)
    }

    pub async fn get_files(&self, hash: &str) -> Result<Vec<TorrentFile>> {
        self.ensure_auth().await?;

        let url = format!("{}/api/v2/torrents/files", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("hash", hash)])
            .header("Referer", &self.config.base_url)
            .send()
            .await?;

        let mut files: Vec<TorrentFile> = response.json().await?;
        fill_missing_indexes(&mut files);
        Ok(files)
    }

    pub async fn set_file_priority(&self, hash: &str, index: i32, priority: i32) -> Result<()> {
        self.ensure_auth().await?;

        let url = format!("{}/api/v2/torrents/filePrio", self.config.base_url);
        let params = [
            ("hash", hash.to_string()),
            ("id", index.to_string()),
            ("priority", priority.to_string()),
        ];

        self.client
            .post(&url)
            .header("Referer", &self.config.base_url)
            .form(&params)
            .send()
            .await?
            .error_for_status()
            .context("Failed to change file priority")?;

        Ok(())
    }

    pub async fn delete_torrent(&self, hash: &str, delete_files: bool) -> Result<()> {
        self.ensure_auth().await?;

        let url = format!("{}/api/v2/torrents/delete", self.config.base_url);
        let params = [
            ("hashes", hash),
            ("deleteFiles", if delete_files { "true" } else { "false" }),
        ];

        self.client
            .post(&url)
            .header("Referer", &self.config.base_url)
            .form(&params)
            .send()
            .await?;

        info!(hash = %hash, "Deleted torrent");
        Ok(())
    }

    /// Every playable episode in the session: finished video files of
    /// category torrents, parsed into identities. Torrents whose file
    /// listing fails are skipped with a warning.
    pub async fn discover_episodes(&self) -> Result<Vec<EpisodeIdentity>> {
        let torrents = self.get_torrents().await?;
        let mut episodes = Vec::new();

        for torrent in torrents {
            let files = match self.get_files(&torrent.hash).await {
                Ok(files) => files,
                Err(e) => {
                    warn!(error = %e, torrent = %torrent.name, "Skipping torrent with unreadable file list");
                    continue;
                }
            };

            let surviving = files.iter().filter(|f| f.priority != 0).count();
            for file in &files {
                if file.priority == 0 || file.progress < 1.0 {
                    continue;
                }
                let path = Path::new(&torrent.save_path).join(&file.name);
                if !is_video_file(&path) || !path.exists() {
                    continue;
                }

                let mut identity = parse_filename(&file.name);
                identity.file_index = file.index;
                identity.path = path;
                identity.torrent_hash.clone_from(&torrent.hash);
                identity.torrent_deletable = surviving == 1;
                episodes.push(identity);
            }
        }

        Ok(episodes)
    }

    /// Remove an episode from disk. The torrent itself is only deleted
    /// when this file is its last wanted one; otherwise the file is
    /// marked "do not download" and unlinked, leaving the torrent able
    /// to keep seeding its remaining files.
    pub async fn delete_episode(&self, episode: &EpisodeIdentity) -> Result<()> {
        if episode.torrent_deletable {
            return self.delete_torrent(&episode.torrent_hash, true).await;
        }

        self.set_file_priority(&episode.torrent_hash, episode.file_index, 0)
            .await?;
        std::fs::remove_file(&episode.path)
            .with_context(|| format!("Failed to delete file: {}", episode.path.display()))?;
        info!(path = %episode.path.display(), "Deleted episode file");
        Ok(())
    }
}
