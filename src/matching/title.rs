//! Title comparison between parsed release names and catalog titles.
//!
//! All comparison happens on a cleaned form: alphanumeric characters
//! only, lowercased. That makes `Re:Zero`, `Re Zero` and `Re.Zero`
//! interchangeable without caring which punctuation a release group or
//! catalog editor preferred.

use strsim::normalized_levenshtein;

use crate::models::EpisodeIdentity;

/// Strip every non-alphanumeric character and lowercase the rest.
///
/// Idempotent: cleaning an already-clean string returns it unchanged.
#[must_use]
pub fn clean_string(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Decides whether a catalog title names the same anime as a parsed
/// release title.
#[derive(Debug, Clone, Copy)]
pub struct TitleMatcher {
    threshold: f64,
}

impl TitleMatcher {
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// True when any of `candidates` matches the identity's title.
    #[must_use]
    pub fn matches_any<'a, I>(&self, identity: &EpisodeIdentity, candidates: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates.into_iter().any(|c| self.matches(identity, c))
    }

    /// Compare one candidate title against the identity.
    ///
    /// Identities without a season qualifier match on cleaned-string
    /// similarity. Identities with a season only match candidates that
    /// contain the title and carry a matching season marker, so
    /// `Kaguya-sama Season 2` will not match the first season's entry.
    #[must_use]
    pub fn matches(&self, identity: &EpisodeIdentity, candidate: &str) -> bool {
        let Some(title) = identity.anime_title.as_deref() else {
            return false;
        };
        let clean_title = clean_string(title);
        let clean_candidate = clean_string(candidate);
        if clean_title.is_empty() || clean_candidate.is_empty() {
            return false;
        }

        if identity.season == 0 {
            normalized_levenshtein(&clean_title, &clean_candidate) >= self.threshold
        } else {
            Self::season_qualified(&clean_title, &clean_candidate, identity.season)
        }
    }

    fn season_qualified(clean_title: &str, clean_candidate: &str, season: u32) -> bool {
        if !clean_candidate.contains(clean_title) {
            return false;
        }
        let digits = season.to_string();
        clean_candidate.ends_with(&digits)
            || clean_candidate.contains(&clean_string(&format!("Season {season}")))
            || clean_candidate.contains(&clean_string(&format!("S{season}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(title: &str, season: u32) -> EpisodeIdentity {
        EpisodeIdentity {
            anime_title: Some(title.to_string()),
            season,
            ..EpisodeIdentity::default()
        }
    }

    #[test]
    fn clean_string_strips_punctuation_and_lowercases() {
        assert_eq!(clean_string("Re:Zero"), "rezero");
        assert_eq!(clean_string("Kaguya-sama wa Kokurasetai?"), "kaguyasamawakokurasetai");
        assert_eq!(clean_string("86"), "86");
    }

    #[test]
    fn clean_string_is_idempotent() {
        let once = clean_string("STEINS;GATE 0");
        assert_eq!(clean_string(&once), once);
    }

    #[test]
    fn near_identical_titles_match() {
        let m = TitleMatcher::new(0.90);
        let id = identity("Sousou no Frieren", 0);
        assert!(m.matches(&id, "Sousou no Frieren"));
        assert!(m.matches(&id, "Sousou no Frieren."));
    }

    #[test]
    fn unrelated_titles_do_not_match() {
        let m = TitleMatcher::new(0.90);
        let id = identity("Sousou no Frieren", 0);
        assert!(!m.matches(&id, "Boku no Hero Academia"));
    }

    #[test]
    fn seasonless_identity_does_not_match_longer_variant() {
        let m = TitleMatcher::new(0.90);
        let id = identity("Kaguya-sama wa Kokurasetai", 0);
        // The sequel's full catalog title is far longer than the parsed
        // title, so plain similarity rejects it.
        assert!(!m.matches(&id, "Kaguya-sama wa Kokurasetai? Tensai-tachi no Renai Zunousen"));
    }

    #[test]
    fn season_qualified_matching() {
        let m = TitleMatcher::new(0.90);
        let id = identity("Kaguya-sama wa Kokurasetai", 2);
        assert!(m.matches(&id, "Kaguya-sama wa Kokurasetai? Season 2"));
        assert!(m.matches(&id, "Kaguya-sama wa Kokurasetai S2"));
        assert!(m.matches(&id, "Kaguya-sama wa Kokurasetai? Tensai-tachi no Renai Zunousen 2"));
        assert!(!m.matches(&id, "Kaguya-sama wa Kokurasetai?"));
        assert!(!m.matches(&id, "Some Other Show Season 2"));
    }

    #[test]
    fn matches_any_checks_every_candidate() {
        let m = TitleMatcher::new(0.90);
        let id = identity("Frieren", 0);
        let titles = ["Sousou no Frieren", "Frieren: Beyond Journey's End", "Frieren"];
        assert!(m.matches_any(&id, titles));
        assert!(!m.matches_any(&id, ["Completely Different", "Also Different"]));
    }

    #[test]
    fn missing_title_never_matches() {
        let m = TitleMatcher::new(0.90);
        let id = EpisodeIdentity::default();
        assert!(!m.matches(&id, "Anything"));
        assert!(!m.matches(&identity("", 0), "Anything"));
    }
}
