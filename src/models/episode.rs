use std::fmt;
use std::path::PathBuf;

use crate::models::CatalogEntry;

/// One playable episode file discovered in the torrent session, together
/// with everything parsed out of its release name and, after resolution,
/// the catalog entry it belongs to.
///
/// `episode_number` and `absolute_episode_number` are kept as canonical
/// decimal strings ("5", "6.5") so fractional recap episodes survive
/// formatting and comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeIdentity {
    pub anime_title: Option<String>,
    /// 0 means unknown or first season.
    pub season: u32,
    pub episode_number: Option<String>,
    /// Only set when a relation chain rewrote `episode_number` to a
    /// per-entry value and the two differ.
    pub absolute_episode_number: Option<String>,
    pub release_version: u32,
    pub file_index: i32,
    pub path: PathBuf,
    pub torrent_hash: String,
    /// True when deleting this episode may remove the whole torrent.
    pub torrent_deletable: bool,
    pub entry: Option<CatalogEntry>,
}

impl Default for EpisodeIdentity {
    fn default() -> Self {
        Self {
            anime_title: None,
            season: 0,
            episode_number: None,
            absolute_episode_number: None,
            release_version: 1,
            file_index: 0,
            path: PathBuf::new(),
            torrent_hash: String::new(),
            torrent_deletable: false,
            entry: None,
        }
    }
}

impl EpisodeIdentity {
    /// Parsed episode number, if any.
    #[must_use]
    pub fn episode_value(&self) -> Option<f64> {
        self.episode_number.as_deref().and_then(|n| n.parse().ok())
    }

    /// Whole-episode progress value for list updates. Fractional episodes
    /// round down so "6.5" counts as episode 6 watched.
    #[must_use]
    pub fn progress(&self) -> Option<u32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        self.episode_value().map(|v| v.floor().max(0.0) as u32)
    }

    /// True only when both the catalog episode count and this file's
    /// episode number are known and equal. Unknown on either side is
    /// treated as not-last.
    #[must_use]
    pub fn is_last_episode(&self) -> bool {
        let Some(count) = self.entry.as_ref().and_then(|e| e.episode_count) else {
            return false;
        };
        let Some(number) = self.episode_value() else {
            return false;
        };
        (number - f64::from(count)).abs() < f64::EPSILON
    }

    /// Full display form, e.g. `Show • Season 2 • Episode 5 • v2`.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.tokens(true).join(" \u{2022} ")
    }

    /// Title and season only, space-joined, for catalog search queries.
    #[must_use]
    pub fn search_title(&self) -> String {
        self.tokens(false).join(" ")
    }

    fn tokens(&self, include_episode: bool) -> Vec<String> {
        let mut tokens = Vec::new();
        if let Some(title) = &self.anime_title {
            tokens.push(title.clone());
        }
        if self.season != 0 {
            tokens.push(format!("Season {}", self.season));
        }
        if include_episode {
            if let Some(number) = &self.episode_number {
                tokens.push(format!("Episode {number}"));
            }
            if self.release_version > 1 {
                tokens.push(format!("v{}", self.release_version));
            }
        }
        tokens
    }
}

impl fmt::Display for EpisodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> EpisodeIdentity {
        EpisodeIdentity {
            anime_title: Some("Kaguya-sama wa Kokurasetai".to_string()),
            season: 2,
            episode_number: Some("5".to_string()),
            ..EpisodeIdentity::default()
        }
    }

    fn entry_with_count(count: Option<u32>) -> CatalogEntry {
        CatalogEntry {
            id: 1,
            official_titles: vec!["Kaguya-sama wa Kokurasetai".to_string()],
            synonyms: Vec::new(),
            episode_count: count,
            entry_url: String::new(),
            prequel_id: None,
            sequel_id: None,
        }
    }

    #[test]
    fn display_name_joins_all_tokens() {
        let mut id = identity();
        id.release_version = 2;
        assert_eq!(
            id.display_name(),
            "Kaguya-sama wa Kokurasetai \u{2022} Season 2 \u{2022} Episode 5 \u{2022} v2"
        );
    }

    #[test]
    fn display_name_skips_unknown_tokens() {
        let id = EpisodeIdentity {
            anime_title: Some("Odd Taxi".to_string()),
            ..EpisodeIdentity::default()
        };
        assert_eq!(id.display_name(), "Odd Taxi");
    }

    #[test]
    fn search_title_excludes_episode_and_version() {
        let mut id = identity();
        id.release_version = 2;
        assert_eq!(id.search_title(), "Kaguya-sama wa Kokurasetai Season 2");
    }

    #[test]
    fn first_season_is_not_rendered() {
        let mut id = identity();
        id.season = 0;
        assert_eq!(id.search_title(), "Kaguya-sama wa Kokurasetai");
    }

    #[test]
    fn progress_floors_fractional_episodes() {
        let mut id = identity();
        id.episode_number = Some("6.5".to_string());
        assert_eq!(id.progress(), Some(6));
    }

    #[test]
    fn last_episode_requires_count_and_number() {
        let mut id = identity();
        assert!(!id.is_last_episode());

        id.entry = Some(entry_with_count(None));
        assert!(!id.is_last_episode());

        id.entry = Some(entry_with_count(Some(12)));
        assert!(!id.is_last_episode());

        id.episode_number = Some("12".to_string());
        assert!(id.is_last_episode());

        id.episode_number = None;
        assert!(!id.is_last_episode());
    }
}
