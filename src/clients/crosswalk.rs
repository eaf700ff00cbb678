//! AniList / TMDB id crosswalk.
//!
//! TMDB numbers episodes per season while AniList lists each season as
//! its own entry, so jumping between the two needs an id mapping. The
//! community-maintained `Fribb/anime-lists` dataset provides one. This
//! module keeps a local copy of that dataset, refreshes it when the
//! upstream repository has a newer commit, and indexes it in both
//! directions:
//!
//! - AniList id -> TMDB series id (unique)
//! - TMDB series id -> AniList ids (one per season, unordered)
//!
//! Only `TV` and `SPECIALS` records take part; movies and other formats
//! never resolve through the season fallback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::constants::crosswalk::{DATASET_FILE, DATASET_REPO};
use crate::constants::http::{REQUEST_TIMEOUT, USER_AGENT};

#[derive(Debug, Deserialize)]
struct CrosswalkRecord {
    anilist_id: Option<i32>,
    themoviedb_id: Option<i32>,
    #[serde(rename = "type")]
    media_type: Option<String>,
}

/// Bidirectional id index built from the dataset.
#[derive(Debug, Default)]
pub struct Crosswalk {
    anilist_to_tmdb: HashMap<i32, i32>,
    tmdb_to_anilist: HashMap<i32, Vec<i32>>,
}

impl Crosswalk {
    /// An index with no mappings. Lookups all miss; the season fallback
    /// is effectively disabled.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_records(records: Vec<CrosswalkRecord>) -> Self {
        let mut crosswalk = Self::default();
        for record in records {
            let eligible = matches!(record.media_type.as_deref(), Some("TV" | "SPECIALS"));
            let (Some(anilist_id), Some(tmdb_id)) = (record.anilist_id, record.themoviedb_id) else {
                continue;
            };
            if !eligible {
                continue;
            }
            crosswalk.anilist_to_tmdb.insert(anilist_id, tmdb_id);
            crosswalk
                .tmdb_to_anilist
                .entry(tmdb_id)
                .or_default()
                .push(anilist_id);
        }
        crosswalk
    }

    /// All AniList entries mapped to one TMDB series, typically one per
    /// season.
    #[must_use]
    pub fn anilist_candidates(&self, tmdb_id: i32) -> &[i32] {
        self.tmdb_to_anilist.get(&tmdb_id).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn tmdb_id(&self, anilist_id: i32) -> Option<i32> {
        self.anilist_to_tmdb.get(&anilist_id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.anilist_to_tmdb.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anilist_to_tmdb.is_empty()
    }
}

/// Downloads and caches the crosswalk dataset.
#[derive(Clone)]
pub struct CrosswalkClient {
    client: Client,
    dataset_path: PathBuf,
    github_token: Option<String>,
}

impl CrosswalkClient {
    #[must_use]
    pub fn new(data_dir: &Path, github_token: Option<String>) -> Self {
        Self {
            // No total timeout: the dataset weighs tens of megabytes and
            // slow links need longer than an API round trip.
            client: Client::builder()
                .user_agent(USER_AGENT)
                .connect_timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            dataset_path: data_dir.join(DATASET_FILE),
            github_token,
        }
    }

    /// Load the crosswalk, refreshing the cached dataset first when the
    /// upstream copy is newer. A failed refresh falls back to whatever
    /// is cached.
    ///
    /// # Errors
    ///
    /// Fails when no usable dataset exists locally and none could be
    /// downloaded, or when the cached file does not parse.
    pub async fn load(&self) -> Result<Crosswalk> {
        if let Err(e) = self.ensure_fresh().await {
            warn!(error = %e, "Could not refresh crosswalk dataset, using cached copy");
        }

        let content = std::fs::read_to_string(&self.dataset_path).with_context(|| {
            format!(
                "Failed to read crosswalk dataset: {}",
                self.dataset_path.display()
            )
        })?;
        let records: Vec<CrosswalkRecord> =
            serde_json::from_str(&content).context("Failed to parse crosswalk dataset")?;

        let crosswalk = Crosswalk::from_records(records);
        info!(mappings = crosswalk.len(), "Loaded id crosswalk");
        Ok(crosswalk)
    }

    /// Download the dataset unconditionally, replacing any cached copy.
    ///
    /// # Errors
    ///
    /// Fails when the download or the write to disk fails.
    pub async fn refresh(&self) -> Result<()> {
        self.download().await
    }

    async fn ensure_fresh(&self) -> Result<()> {
        if !self.dataset_path.exists() {
            info!("No cached crosswalk dataset, downloading");
            return self.download().await;
        }

        let Some(local) = self.local_modified() else {
            return Ok(());
        };
        match self.remote_commit_date().await {
            Ok(Some(remote)) if remote > local => {
                info!(%remote, %local, "Crosswalk dataset is stale, downloading");
                self.download().await
            }
            Ok(_) => {
                debug!("Cached crosswalk dataset is up to date");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Could not check crosswalk dataset age");
                Ok(())
            }
        }
    }

    /// Date of the newest upstream commit touching the dataset file.
    async fn remote_commit_date(&self) -> Result<Option<DateTime<Utc>>> {
        #[derive(Deserialize)]
        struct CommitInfo {
            commit: CommitDetail,
        }

        #[derive(Deserialize)]
        struct CommitDetail {
            committer: Option<CommitSignature>,
        }

        #[derive(Deserialize)]
        struct CommitSignature {
            date: String,
        }

        let url = format!("https://api.github.com/repos/{DATASET_REPO}/commits");
        let mut request = self
            .client
            .get(url)
            .query(&[("path", DATASET_FILE), ("per_page", "1")]);
        if let Some(token) = &self.github_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Commit lookup returned an error status");
            return Ok(None);
        }

        let commits: Vec<CommitInfo> = response.json().await?;
        let date = commits
            .first()
            .and_then(|c| c.commit.committer.as_ref())
            .and_then(|sig| DateTime::parse_from_rfc3339(&sig.date).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Ok(date)
    }

    async fn download(&self) -> Result<()> {
        let url = format!("https://raw.githubusercontent.com/{DATASET_REPO}/master/{DATASET_FILE}");
        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .context("Crosswalk dataset download failed")?;
        let bytes = response.bytes().await?;

        if let Some(parent) = self.dataset_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.dataset_path, &bytes).with_context(|| {
            format!(
                "Failed to write crosswalk dataset: {}",
                self.dataset_path.display()
            )
        })?;
        info!(bytes = bytes.len(), path = %self.dataset_path.display(), "Downloaded crosswalk dataset");
        Ok(())
    }

    fn local_modified(&self) -> Option<DateTime<Utc>> {
        let modified = std::fs::metadata(&self.dataset_path).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(records: &str) -> Crosswalk {
        let records: Vec<CrosswalkRecord> = serde_json::from_str(records).unwrap();
        Crosswalk::from_records(records)
    }

    #[test]
    fn indexes_tv_records_both_ways() {
        let crosswalk = parse(
            r#"[
                {"anilist_id": 101921, "themoviedb_id": 83121, "type": "TV"},
                {"anilist_id": 112641, "themoviedb_id": 83121, "type": "TV"}
            ]"#,
        );
        assert_eq!(crosswalk.tmdb_id(101921), Some(83121));
        assert_eq!(crosswalk.tmdb_id(112641), Some(83121));
        assert_eq!(crosswalk.anilist_candidates(83121), &[101921, 112641]);
    }

    #[test]
    fn skips_movies_and_incomplete_records() {
        let crosswalk = parse(
            r#"[
                {"anilist_id": 21519, "themoviedb_id": 372058, "type": "MOVIE"},
                {"anilist_id": 5, "type": "TV"},
                {"themoviedb_id": 95557, "type": "TV"},
                {"anilist_id": 127230, "themoviedb_id": 95557, "type": "SPECIALS"}
            ]"#,
        );
        assert_eq!(crosswalk.len(), 1);
        assert_eq!(crosswalk.tmdb_id(127230), Some(95557));
        assert_eq!(crosswalk.tmdb_id(21519), None);
    }

    #[test]
    fn empty_crosswalk_misses_every_lookup() {
        let crosswalk = Crosswalk::empty();
        assert!(crosswalk.is_empty());
        assert_eq!(crosswalk.tmdb_id(1), None);
        assert!(crosswalk.anilist_candidates(1).is_empty());
    }
}
