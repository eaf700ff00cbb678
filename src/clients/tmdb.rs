use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::clients::http::send_retrying;
use crate::constants::http::{REQUEST_TIMEOUT, USER_AGENT};

const TMDB_API: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Clone, Deserialize)]
pub struct TvSearchResult {
    pub id: i32,
    pub name: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TvSearchResult>,
}

#[derive(Deserialize)]
struct TvDetails {
    #[serde(default)]
    seasons: Vec<TvSeason>,
}

#[derive(Deserialize)]
struct TvSeason {
    name: String,
    season_number: u32,
    #[serde(default)]
    episode_count: u32,
}

/// One season mapped onto the show's absolute episode numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonSpan {
    pub season_number: u32,
    pub first_episode: u32,
    pub last_episode: u32,
}

impl SeasonSpan {
    #[must_use]
    pub fn contains(&self, absolute: u32) -> bool {
        (self.first_episode..=self.last_episode).contains(&absolute)
    }

    #[must_use]
    pub fn episode_count(&self) -> u32 {
        self.last_episode - self.first_episode + 1
    }
}

#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

impl TmdbClient {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
        }
    }

    /// Search TV series by name. Error statuses degrade to no results.
    pub async fn search_tv(&self, query: &str) -> Result<Vec<TvSearchResult>> {
        let request = self
            .client
            .get(format!("{TMDB_API}/search/tv"))
            .query(&[("api_key", self.api_key.as_str()), ("query", query)]);

        let response = send_retrying(request).await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "TMDB search returned an error status");
            return Ok(Vec::new());
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.results)
    }

    /// Regular seasons of a series laid out over absolute episode
    /// numbers, in season order.
    pub async fn season_spans(&self, series_id: i32) -> Result<Vec<SeasonSpan>> {
        let request = self
            .client
            .get(format!("{TMDB_API}/tv/{series_id}"))
            .query(&[("api_key", self.api_key.as_str())]);

        let response = send_retrying(request).await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), series_id, "TMDB series lookup returned an error status");
            return Ok(Vec::new());
        }

        let parsed: TvDetails = response.json().await?;
        Ok(build_spans(parsed.seasons))
    }
}

/// Specials and empty seasons do not advance absolute numbering and are
/// dropped entirely.
fn build_spans(seasons: Vec<TvSeason>) -> Vec<SeasonSpan> {
    let mut spans = Vec::new();
    let mut cumulative = 0;
    for season in seasons {
        if season.name == "Specials" || season.episode_count == 0 {
            continue;
        }
        spans.push(SeasonSpan {
            season_number: season.season_number,
            first_episode: cumulative + 1,
            last_episode: cumulative + season.episode_count,
        });
        cumulative += season.episode_count;
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season(name: &str, number: u32, count: u32) -> TvSeason {
        TvSeason {
            name: name.to_string(),
            season_number: number,
            episode_count: count,
        }
    }

    #[test]
    fn spans_accumulate_over_seasons() {
        let spans = build_spans(vec![
            season("Season 1", 1, 12),
            season("Season 2", 2, 13),
            season("Season 3", 3, 24),
        ]);
        assert_eq!(
            spans,
            vec![
                SeasonSpan { season_number: 1, first_episode: 1, last_episode: 12 },
                SeasonSpan { season_number: 2, first_episode: 13, last_episode: 25 },
                SeasonSpan { season_number: 3, first_episode: 26, last_episode: 49 },
            ]
        );
    }

    #[test]
    fn specials_and_empty_seasons_are_skipped() {
        let spans = build_spans(vec![
            season("Specials", 0, 7),
            season("Season 1", 1, 12),
            season("Season 2", 2, 0),
            season("Season 3", 3, 10),
        ]);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].season_number, 1);
        assert_eq!(spans[1].first_episode, 13);
        assert_eq!(spans[1].last_episode, 22);
    }

    #[test]
    fn span_contains_its_bounds() {
        let span = SeasonSpan { season_number: 2, first_episode: 13, last_episode: 25 };
        assert!(span.contains(13));
        assert!(span.contains(25));
        assert!(!span.contains(12));
        assert!(!span.contains(26));
        assert_eq!(span.episode_count(), 13);
    }
}
