//! AniList list progress updates.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clients::anilist::{AnilistClient, ListStatus, UpdateStatus};
use crate::credentials::{CredentialStore, keys};
use crate::models::EpisodeIdentity;

pub struct ProgressUpdater {
    anilist: AnilistClient,
    store: Arc<dyn CredentialStore>,
}

impl ProgressUpdater {
    pub fn new(anilist: AnilistClient, store: Arc<dyn CredentialStore>) -> Self {
        Self { anilist, store }
    }

    /// Whether the user still has to paste an access token before
    /// updates can go through.
    #[must_use]
    pub fn needs_authorization(&self) -> bool {
        self.store.get(keys::ANILIST_TOKEN).is_none()
    }

    pub fn store_token(&self, token: &str) -> anyhow::Result<()> {
        self.store.set(keys::ANILIST_TOKEN, token.trim())
    }

    /// Push watch progress for this episode to AniList. Returns `true`
    /// when the stored token was rejected and the user has to authorize
    /// again; every other outcome, including transport errors, is
    /// logged and swallowed so playback flow never stalls on AniList.
    pub async fn update(&self, identity: &EpisodeIdentity) -> bool {
        let Some(entry) = identity.entry.as_ref() else {
            debug!("No catalog entry resolved, skipping progress update");
            return false;
        };
        let Some(progress) = identity.progress() else {
            debug!("No episode number, skipping progress update");
            return false;
        };
        let Some(token) = self.store.get(keys::ANILIST_TOKEN) else {
            debug!("No AniList token stored, skipping progress update");
            return false;
        };

        let status = list_status_for(identity);
        match self
            .anilist
            .save_list_entry(&token, entry.id, status, progress)
            .await
        {
            Ok(outcome) => self.handle_outcome(outcome, entry.primary_title(), progress),
            Err(e) => {
                warn!(error = %e, "AniList progress update failed");
                false
            }
        }
    }

    fn handle_outcome(&self, outcome: UpdateStatus, title: &str, progress: u32) -> bool {
        match outcome {
            UpdateStatus::Applied => {
                info!(title, progress, "Updated AniList progress");
                false
            }
            UpdateStatus::InvalidToken => {
                warn!("AniList rejected the stored token, discarding it");
                if let Err(e) = self.store.unset(keys::ANILIST_TOKEN) {
                    warn!(error = %e, "Failed to discard the rejected token");
                }
                true
            }
            UpdateStatus::Failed => {
                warn!(title, "AniList refused the progress update");
                false
            }
        }
    }
}

/// An episode that finishes the season marks the entry completed,
/// otherwise it stays on the watching list.
fn list_status_for(identity: &EpisodeIdentity) -> ListStatus {
    if identity.is_last_episode() {
        ListStatus::Completed
    } else {
        ListStatus::Current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryStore;
    use crate::models::CatalogEntry;

    fn updater_with_token(token: Option<&str>) -> ProgressUpdater {
        let store = MemoryStore::default();
        if let Some(token) = token {
            store.set(keys::ANILIST_TOKEN, token).unwrap();
        }
        ProgressUpdater::new(AnilistClient::new(), Arc::new(store))
    }

    fn identity(episode: &str, count: Option<u32>) -> EpisodeIdentity {
        EpisodeIdentity {
            anime_title: Some("Some Show".to_string()),
            episode_number: Some(episode.to_string()),
            entry: Some(CatalogEntry {
                id: 7,
                official_titles: vec!["Some Show".to_string()],
                synonyms: Vec::new(),
                episode_count: count,
                entry_url: String::new(),
                prequel_id: None,
                sequel_id: None,
            }),
            ..EpisodeIdentity::default()
        }
    }

    #[test]
    fn authorization_needed_only_without_token() {
        assert!(updater_with_token(None).needs_authorization());
        assert!(!updater_with_token(Some("tok")).needs_authorization());
    }

    #[test]
    fn storing_a_token_trims_whitespace() {
        let updater = updater_with_token(None);
        updater.store_token("  abc  ").unwrap();
        assert!(!updater.needs_authorization());
        assert_eq!(updater.store.get(keys::ANILIST_TOKEN).as_deref(), Some("abc"));
    }

    #[test]
    fn rejected_token_is_discarded_and_flagged() {
        let updater = updater_with_token(Some("stale"));
        let needs_auth = updater.handle_outcome(UpdateStatus::InvalidToken, "Some Show", 5);
        assert!(needs_auth);
        assert!(updater.needs_authorization());
    }

    #[test]
    fn applied_and_failed_outcomes_keep_the_token() {
        let updater = updater_with_token(Some("tok"));
        assert!(!updater.handle_outcome(UpdateStatus::Applied, "Some Show", 5));
        assert!(!updater.handle_outcome(UpdateStatus::Failed, "Some Show", 5));
        assert!(!updater.needs_authorization());
    }

    #[test]
    fn final_episode_completes_the_entry() {
        assert_eq!(list_status_for(&identity("12", Some(12))), ListStatus::Completed);
        assert_eq!(list_status_for(&identity("5", Some(12))), ListStatus::Current);
        assert_eq!(list_status_for(&identity("12", None)), ListStatus::Current);
    }

    #[tokio::test]
    async fn update_without_token_does_nothing() {
        let updater = updater_with_token(None);
        assert!(!updater.update(&identity("5", Some(12))).await);
    }

    #[tokio::test]
    async fn update_without_entry_does_nothing() {
        let updater = updater_with_token(Some("tok"));
        let mut identity = identity("5", Some(12));
        identity.entry = None;
        assert!(!updater.update(&identity).await);
    }
}
