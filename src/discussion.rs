//! Episode discussion lookup on r/anime.
//!
//! A thread only counts when the search pins down exactly one hit;
//! anything ambiguous falls back to handing the user a search page URL
//! instead of guessing. Synonyms widen the net in a second attempt only,
//! since they often collide with other shows.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::clients::reddit::{DiscussionThread, RedditClient};
use crate::models::EpisodeIdentity;

#[async_trait]
pub trait ThreadSearch: Send + Sync {
    async fn find_threads(&self, query: &str) -> Result<Vec<DiscussionThread>>;
}

#[async_trait]
impl ThreadSearch for RedditClient {
    async fn find_threads(&self, query: &str) -> Result<Vec<DiscussionThread>> {
        self.search_episode_threads(query).await
    }
}

pub struct DiscussionFinder<S> {
    search: S,
}

impl<S: ThreadSearch> DiscussionFinder<S> {
    pub fn new(search: S) -> Self {
        Self { search }
    }

    /// Find the discussion thread for this episode, if exactly one
    /// exists. Identities without a resolved catalog entry never match;
    /// search failures count as "no thread".
    pub async fn find(&self, identity: &EpisodeIdentity) -> Option<DiscussionThread> {
        let entry = identity.entry.as_ref()?;

        let query = build_query(identity, &entry.official_titles)?;
        if let Some(thread) = self.single_hit(&query).await {
            return Some(thread);
        }

        if entry.synonyms.is_empty() {
            return None;
        }
        let retry_query = build_query(identity, &entry.all_titles())?;
        self.single_hit(&retry_query).await
    }

    async fn single_hit(&self, query: &str) -> Option<DiscussionThread> {
        match self.search.find_threads(query).await {
            Ok(mut threads) if threads.len() == 1 => Some(threads.remove(0)),
            Ok(threads) => {
                debug!(hits = threads.len(), query, "Search did not pin down a single thread");
                None
            }
            Err(e) => {
                debug!(error = %e, query, "Thread search failed");
                None
            }
        }
    }
}

/// Search page URL to open when no single thread was found.
#[must_use]
pub fn fallback_url(identity: &EpisodeIdentity) -> String {
    RedditClient::search_page_url(identity.anime_title.as_deref().unwrap_or_default())
}

/// Compose the flair-restricted search query: any of the titles, and
/// when episode numbers are known, the episode phrase. A rewritten
/// episode number searches under both its relative and absolute forms,
/// since thread titles use either convention.
fn build_query(identity: &EpisodeIdentity, titles: &[String]) -> Option<String> {
    let quoted: Vec<String> = titles
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    let title_clause = or_group(&quoted)?;

    let mut query = format!("flair:episode {title_clause}");
    if let Some(episode_clause) = episode_clause(identity) {
        query.push_str(" AND ");
        query.push_str(&episode_clause);
    }
    Some(query)
}

fn episode_clause(identity: &EpisodeIdentity) -> Option<String> {
    let mut phrases = Vec::new();
    for number in [&identity.episode_number, &identity.absolute_episode_number]
        .into_iter()
        .flatten()
    {
        let phrase = format!("\"Episode {number}\"");
        if !phrases.contains(&phrase) {
            phrases.push(phrase);
        }
    }
    or_group(&phrases)
}

fn or_group(items: &[String]) -> Option<String> {
    match items {
        [] => None,
        [one] => Some(one.clone()),
        many => Some(format!("({})", many.join(" OR "))),
    }
}
