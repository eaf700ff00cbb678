//! Catalog resolution.
//!
//! Two strategies run in order. The direct one searches the catalog by
//! parsed title and picks the first result that passes title matching.
//! When that fails and an episode number is known, the fallback derives
//! an absolute episode number from TMDB's season layout, maps the TMDB
//! series to its per-season catalog entries through the id crosswalk,
//! and walks the relation chain to find the entry the episode lands in.

pub mod relations;

pub use relations::{ChainError, RelationChain, RelationSource};

use anyhow::Result;
use tracing::{debug, warn};

use crate::clients::tmdb::SeasonSpan;
use crate::clients::{AnilistClient, Crosswalk, TmdbClient};
use crate::matching::TitleMatcher;
use crate::models::{CatalogEntry, EpisodeIdentity};

pub struct CatalogResolver {
    anilist: AnilistClient,
    tmdb: Option<TmdbClient>,
    crosswalk: Crosswalk,
    matcher: TitleMatcher,
}

impl CatalogResolver {
    #[must_use]
    pub fn new(
        anilist: AnilistClient,
        tmdb: Option<TmdbClient>,
        crosswalk: Crosswalk,
        matcher: TitleMatcher,
    ) -> Self {
        Self {
            anilist,
            tmdb,
            crosswalk,
            matcher,
        }
    }

    /// Find the catalog entry for a parsed episode. The season fallback
    /// may rewrite the identity's episode number to an entry-relative
    /// one, keeping the absolute number alongside it.
    ///
    /// Lookup failures degrade to "not found"; a broken network never
    /// aborts the session.
    pub async fn resolve(&self, identity: &mut EpisodeIdentity) -> Option<CatalogEntry> {
        identity.anime_title.as_ref()?;

        match self.resolve_by_title(identity).await {
            Ok(Some(entry)) => return Some(entry),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Catalog title search failed"),
        }

        match self.resolve_by_season_layout(identity).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Season layout fallback failed");
                None
            }
        }
    }

    async fn resolve_by_title(&self, identity: &EpisodeIdentity) -> Result<Option<CatalogEntry>> {
        let results = self.anilist.search(&identity.search_title()).await?;
        Ok(select_match(&self.matcher, identity, results))
    }

    async fn resolve_by_season_layout(
        &self,
        identity: &mut EpisodeIdentity,
    ) -> Result<Option<CatalogEntry>> {
        let Some(tmdb) = &self.tmdb else {
            return Ok(None);
        };
        let Some(episode) = identity.progress().filter(|e| *e > 0) else {
            return Ok(None);
        };
        let Some(title) = identity.anime_title.clone() else {
            return Ok(None);
        };

        let Some((series_id, absolute)) = self
            .locate_absolute(tmdb, &title, identity.season, episode)
            .await?
        else {
            return Ok(None);
        };

        let candidates = self.crosswalk.anilist_candidates(series_id);
        if candidates.is_empty() {
            debug!(series_id, "No crosswalk entries for TMDB series");
            return Ok(None);
        }

        let chain = match RelationChain::build(&self.anilist, candidates).await {
            Ok(chain) => chain,
            Err(e) => {
                warn!(error = %e, series_id, "Could not build relation chain");
                return Ok(None);
            }
        };
        let Some((entry_id, relative)) = chain.resolve_absolute(absolute) else {
            return Ok(None);
        };

        if relative != absolute {
            identity.episode_number = Some(relative.to_string());
            identity.absolute_episode_number = Some(absolute.to_string());
        }
        Ok(chain.take(entry_id))
    }

    /// First TMDB series whose season layout can place the episode.
    async fn locate_absolute(
        &self,
        tmdb: &TmdbClient,
        title: &str,
        season: u32,
        episode: u32,
    ) -> Result<Option<(i32, u32)>> {
        for series in tmdb.search_tv(title).await? {
            let spans = tmdb.season_spans(series.id).await?;
            if let Some(absolute) = derive_absolute(&spans, season, episode) {
                debug!(series = %series.name, series_id = series.id, absolute, "Season layout placed the episode");
                return Ok(Some((series.id, absolute)));
            }
        }
        Ok(None)
    }
}

/// First search result that matches on title and is not disqualified by
/// its episode count. An entry reporting fewer episodes than the file
/// claims cannot be the right one.
fn select_match(
    matcher: &TitleMatcher,
    identity: &EpisodeIdentity,
    results: Vec<CatalogEntry>,
) -> Option<CatalogEntry> {
    let episode = identity.episode_value();
    results.into_iter().find(|entry| {
        let titles = entry.all_titles();
        if !matcher.matches_any(identity, titles.iter().map(String::as_str)) {
            return false;
        }
        match (episode, entry.episode_count) {
            (Some(number), Some(count)) if number > f64::from(count) => false,
            _ => true,
        }
    })
}

/// Map a parsed (season, episode) pair onto absolute numbering using the
/// season spans, scanning seasons in order. A span containing the bare
/// episode number claims it as already absolute; a season-number match
/// shifts the episode into that season's range.
fn derive_absolute(spans: &[SeasonSpan], season: u32, episode: u32) -> Option<u32> {
    for span in spans {
        if season != 0 && season == span.season_number && episode <= span.episode_count() {
            return Some(span.first_episode + episode - 1);
        }
        if episode <= span.last_episode {
            return Some(episode);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i32, title: &str, episode_count: Option<u32>) -> CatalogEntry {
        CatalogEntry {
            id,
            official_titles: vec![title.to_string()],
            synonyms: Vec::new(),
            episode_count,
            entry_url: String::new(),
            prequel_id: None,
            sequel_id: None,
        }
    }

    fn identity(title: &str, episode: &str) -> EpisodeIdentity {
        EpisodeIdentity {
            anime_title: Some(title.to_string()),
            episode_number: Some(episode.to_string()),
            ..EpisodeIdentity::default()
        }
    }

    #[test]
    fn first_matching_result_wins() {
        let matcher = TitleMatcher::new(0.90);
        let id = identity("Frieren", "5");
        let results = vec![
            entry(10, "Unrelated Show", Some(12)),
            entry(11, "Frieren", Some(28)),
            entry(12, "Frieren", Some(28)),
        ];
        let found = select_match(&matcher, &id, results);
        assert_eq!(found.map(|e| e.id), Some(11));
    }

    #[test]
    fn short_entries_are_disqualified_by_episode_number() {
        let matcher = TitleMatcher::new(0.90);
        let id = identity("One Piece", "1071");
        let results = vec![
            entry(20, "One Piece", Some(12)),
            entry(21, "One Piece", None),
        ];
        let found = select_match(&matcher, &id, results);
        assert_eq!(found.map(|e| e.id), Some(21));
    }

    #[test]
    fn no_match_yields_none() {
        let matcher = TitleMatcher::new(0.90);
        let id = identity("Frieren", "5");
        let results = vec![entry(30, "Something Else Entirely", Some(12))];
        assert!(select_match(&matcher, &id, results).is_none());
    }

    fn spans() -> Vec<SeasonSpan> {
        vec![
            SeasonSpan { season_number: 1, first_episode: 1, last_episode: 6 },
            SeasonSpan { season_number: 2, first_episode: 7, last_episode: 18 },
        ]
    }

    #[test]
    fn bare_episode_within_a_span_is_already_absolute() {
        assert_eq!(derive_absolute(&spans(), 0, 4), Some(4));
        assert_eq!(derive_absolute(&spans(), 0, 15), Some(15));
    }

    #[test]
    fn season_match_shifts_episode_into_its_range() {
        // Episode 8 of season 2 exceeds season 1's span, so the season
        // rule places it: 7 + 8 - 1.
        assert_eq!(derive_absolute(&spans(), 2, 8), Some(14));
    }

    #[test]
    fn episode_fitting_an_earlier_span_stays_put() {
        // Season scanning is strictly in order: a number small enough
        // for season 1 resolves there even when a season is given.
        assert_eq!(derive_absolute(&spans(), 2, 5), Some(5));
    }

    #[test]
    fn episode_beyond_every_span_fails() {
        assert_eq!(derive_absolute(&spans(), 0, 19), None);
        assert_eq!(derive_absolute(&[], 0, 1), None);
    }
}
