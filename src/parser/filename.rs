//! Release name parsing.
//!
//! Fansub and scene release names carry the anime title, episode number,
//! season and release version in a handful of recurring shapes:
//!
//! - `[Group] Title - 05 (1080p).mkv`
//! - `Title.S02E07.1080p.WEB.x264-GROUP.mkv`
//! - `[Group] Title 2nd Season - 11v2.mkv`
//! - `Title Episode 3.mkv`
//!
//! Parsing never fails: anything that cannot be recognized is left on the
//! identity as a bare title so the rest of the pipeline can degrade
//! gracefully.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::constants::VIDEO_EXTENSIONS;
use crate::models::EpisodeIdentity;

/// Parse a release file name into an [`EpisodeIdentity`].
///
/// Torrent bookkeeping fields (path, hash, file index) are left at their
/// defaults; callers fill them in from the session they came from.
#[must_use]
pub fn parse_filename(raw_name: &str) -> EpisodeIdentity {
    let name = raw_name.rsplit('/').next().unwrap_or(raw_name);
    let name = strip_video_extension(name);
    let name = replace_delimiters(name);
    let name = strip_bracketed(&name);
    let name = collapse_whitespace(&name);

    let mut identity = EpisodeIdentity::default();
    if name.is_empty() {
        return identity;
    }

    let parsed = parse_season_episode(&name)
        .or_else(|| parse_dash_episode(&name))
        .or_else(|| parse_keyword_episode(&name))
        .or_else(|| parse_trailing_number(&name));

    let (title, season) = match parsed {
        Some(p) => {
            identity.episode_number = Some(canonical_number(p.episode));
            if let Some(version) = p.version {
                identity.release_version = version;
            }
            (p.title, p.season)
        }
        None => (name, None),
    };

    let (title, title_season) = extract_season(&title);
    // First seasons are labelled "Season 1" by release groups but are
    // plain unsuffixed entries in the catalog.
    identity.season = match season.or(title_season) {
        None | Some(1) => 0,
        Some(n) => n,
    };

    let title = title.trim_matches(|c: char| c == '-' || c.is_whitespace());
    if !title.is_empty() {
        identity.anime_title = Some(title.to_string());
    }
    identity
}

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

struct ParsedEpisode {
    title: String,
    episode: f64,
    season: Option<u32>,
    version: Option<u32>,
}

fn extract_fields(caps: &Captures<'_>) -> Option<ParsedEpisode> {
    Some(ParsedEpisode {
        title: caps.name("title")?.as_str().to_string(),
        episode: caps.name("episode")?.as_str().parse().ok()?,
        season: caps.name("season").and_then(|m| m.as_str().parse().ok()),
        version: caps.name("version").and_then(|m| m.as_str().parse().ok()),
    })
}

fn parse_season_episode(name: &str) -> Option<ParsedEpisode> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"(?i)^(?P<title>.+?)[\s\-]+S(?P<season>\d{1,2})\s*E(?P<episode>\d{1,4}(?:\.\d+)?)(?:\s*v(?P<version>\d+))?\b",
    );

    let caps = re.captures(name)?;
    extract_fields(&caps)
}

fn parse_dash_episode(name: &str) -> Option<ParsedEpisode> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"^(?P<title>.+?)\s+-\s+(?P<episode>\d{1,4}(?:\.\d+)?)(?:\s*v(?P<version>\d+))?(?:\s.*)?$",
    );

    let caps = re.captures(name)?;
    extract_fields(&caps)
}

fn parse_keyword_episode(name: &str) -> Option<ParsedEpisode> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"(?i)^(?P<title>.+?)\s+(?:episode|ep\.?|e)\s*(?P<episode>\d{1,4}(?:\.\d+)?)(?:\s*v(?P<version>\d+))?\b",
    );

    let caps = re.captures(name)?;
    extract_fields(&caps)
}

fn parse_trailing_number(name: &str) -> Option<ParsedEpisode> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"^(?P<title>.+?)\s+(?P<episode>\d{1,4}(?:\.\d+)?)(?:\s*v(?P<version>\d+))?$",
    );

    let caps = re.captures(name)?;
    let parsed = extract_fields(&caps)?;
    if looks_like_metadata_number(parsed.episode) {
        return None;
    }
    Some(parsed)
}

/// Bare trailing numbers that are almost certainly a year or a resolution
/// rather than an episode.
fn looks_like_metadata_number(value: f64) -> bool {
    if value.fract() != 0.0 {
        return false;
    }
    #[allow(clippy::cast_possible_truncation)]
    let n = value as i64;
    (1990..=2099).contains(&n) || matches!(n, 480 | 720 | 1080 | 2160)
}

/// Pull a season marker (`Season 2`, `2nd Season`, `S2`) out of the title,
/// returning the title with the marker removed.
fn extract_season(title: &str) -> (String, Option<u32>) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"(?i)\b(?:season\s*(?P<num>\d{1,2})|s(?P<abbr>\d{1,2})|(?P<ord>\d{1,2})(?:st|nd|rd|th)\s+season)\b",
    );

    let Some(caps) = re.captures(title) else {
        return (title.to_string(), None);
    };
    let season = caps
        .name("num")
        .or_else(|| caps.name("abbr"))
        .or_else(|| caps.name("ord"))
        .and_then(|m| m.as_str().parse().ok());
    let Some(full) = caps.get(0) else {
        return (title.to_string(), None);
    };
    let mut remainder = String::with_capacity(title.len());
    remainder.push_str(&title[..full.start()]);
    remainder.push_str(&title[full.end()..]);
    (collapse_whitespace(&remainder), season)
}

fn strip_video_extension(name: &str) -> &str {
    if let Some((stem, ext)) = name.rsplit_once('.') {
        if VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return stem;
        }
    }
    name
}

/// Normalize the delimiter characters release groups use in place of
/// spaces. Dots are kept when they sit between digits so fractional
/// episode numbers like `06.5` survive.
fn replace_delimiters(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '_' | '&' | '+' | ',' | '|' => out.push(' '),
            '.' => {
                let between_digits = i > 0
                    && chars[i - 1].is_ascii_digit()
                    && chars.get(i + 1).is_some_and(char::is_ascii_digit);
                out.push(if between_digits { '.' } else { ' ' });
            }
            _ => out.push(c),
        }
    }
    out
}

/// Drop bracketed and parenthesized segments: release group tags,
/// resolutions, checksums and similar metadata.
fn strip_bracketed(name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"\[[^\]]*\]|\([^)]*\)");
    re.replace_all(name, " ").into_owned()
}

fn collapse_whitespace(name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"\s+");
    re.replace_all(name.trim(), " ").trim().to_string()
}

/// Render an episode number in its canonical decimal form: no leading
/// zeros, no trailing fraction for whole numbers.
fn canonical_number(value: f64) -> String {
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_fansub_name() {
        let id = parse_filename("[SubsPlease] Sousou no Frieren - 05 (1080p) [ABCD1234].mkv");
        assert_eq!(id.anime_title.as_deref(), Some("Sousou no Frieren"));
        assert_eq!(id.episode_number.as_deref(), Some("5"));
        assert_eq!(id.season, 0);
        assert_eq!(id.release_version, 1);
    }

    #[test]
    fn strips_leading_zeros_from_episode() {
        let id = parse_filename("[Group] Long Running Show - 013.mkv");
        assert_eq!(id.episode_number.as_deref(), Some("13"));
    }

    #[test]
    fn keeps_fractional_episode_numbers() {
        let id = parse_filename("[SubsPlease] Mushoku Tensei - 06.5 (1080p).mkv");
        assert_eq!(id.anime_title.as_deref(), Some("Mushoku Tensei"));
        assert_eq!(id.episode_number.as_deref(), Some("6.5"));
    }

    #[test]
    fn parses_release_version() {
        let id = parse_filename("[SubsPlease] Spy x Family - 12v2 (1080p).mkv");
        assert_eq!(id.episode_number.as_deref(), Some("12"));
        assert_eq!(id.release_version, 2);
    }

    #[test]
    fn parses_dot_separated_scene_name() {
        let id = parse_filename("Show.Name.S02E07.1080p.WEB.x264-GROUP.mkv");
        assert_eq!(id.anime_title.as_deref(), Some("Show Name"));
        assert_eq!(id.season, 2);
        assert_eq!(id.episode_number.as_deref(), Some("7"));
    }

    #[test]
    fn first_season_coerces_to_zero() {
        let id = parse_filename("Show Name S01E05.mkv");
        assert_eq!(id.season, 0);
        assert_eq!(id.episode_number.as_deref(), Some("5"));
    }

    #[test]
    fn detects_ordinal_season_in_title() {
        let id = parse_filename("[Judas] Kaguya-sama 2nd Season - 11.mkv");
        assert_eq!(id.anime_title.as_deref(), Some("Kaguya-sama"));
        assert_eq!(id.season, 2);
        assert_eq!(id.episode_number.as_deref(), Some("11"));
    }

    #[test]
    fn detects_season_word_in_title() {
        let id = parse_filename("Yahari Ore no Seishun Season 3 - 04 (720p).mkv");
        assert_eq!(id.anime_title.as_deref(), Some("Yahari Ore no Seishun"));
        assert_eq!(id.season, 3);
    }

    #[test]
    fn parses_underscore_delimited_name() {
        let id = parse_filename("Show_Name_-_05_(720p).mkv");
        assert_eq!(id.anime_title.as_deref(), Some("Show Name"));
        assert_eq!(id.episode_number.as_deref(), Some("5"));
    }

    #[test]
    fn parses_episode_keyword() {
        let id = parse_filename("Odd Taxi Episode 3.mkv");
        assert_eq!(id.anime_title.as_deref(), Some("Odd Taxi"));
        assert_eq!(id.episode_number.as_deref(), Some("3"));
    }

    #[test]
    fn strips_directory_prefix() {
        let id = parse_filename("Season Folder/[Group] Show - 01.mkv");
        assert_eq!(id.anime_title.as_deref(), Some("Show"));
        assert_eq!(id.episode_number.as_deref(), Some("1"));
    }

    #[test]
    fn name_without_episode_keeps_full_title() {
        let id = parse_filename("Koe no Katachi (2016).mkv");
        assert_eq!(id.anime_title.as_deref(), Some("Koe no Katachi"));
        assert_eq!(id.episode_number, None);
    }

    #[test]
    fn trailing_year_is_not_an_episode() {
        let id = parse_filename("Great Show 2023.mkv");
        assert_eq!(id.anime_title.as_deref(), Some("Great Show 2023"));
        assert_eq!(id.episode_number, None);
    }

    #[test]
    fn unparseable_name_yields_bare_identity() {
        let id = parse_filename("...");
        assert_eq!(id.anime_title, None);
        assert_eq!(id.episode_number, None);
        assert_eq!(id.season, 0);
    }

    #[test]
    fn numeric_title_with_dash_episode() {
        let id = parse_filename("[Group] 86 - 21 (1080p).mkv");
        assert_eq!(id.anime_title.as_deref(), Some("86"));
        assert_eq!(id.episode_number.as_deref(), Some("21"));
    }
}
