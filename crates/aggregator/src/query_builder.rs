//! Builds scraper search queries from a parsed request id and resolved
//! title metadata, and recognizes episode markers inside release names.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use streamforge_core::episode_matcher;
use streamforge_core::models::{ParsedRequestId, Queries, TitleBasics};

use crate::title_index::TitleIndex;

static NON_ALNUM_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{Alphabetic}0-9\s]+").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static POSSESSIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\w+) s\b").unwrap());

/// Collapse punctuation runs to single spaces, collapse whitespace, then
/// re-attach possessives that punctuation-stripping severed
/// (`"handmaid s tale"` -> `"handmaids tale"`).
pub fn normalize(s: &str) -> String {
    let no_punct = NON_ALNUM_RUN.replace_all(s, " ");
    let collapsed = WHITESPACE_RUN.replace_all(no_punct.trim(), " ");
    POSSESSIVE.replace_all(&collapsed, "${1}s").trim().to_string()
}

/// Try, in order, the three episode-marker shapes release names commonly use.
pub fn parse_episode(text: &str) -> Option<(u32, u32)> {
    episode_matcher::parse_episode(text)
}

/// `true` if `season`/`episode` are unset (no filter applies), `false` if
/// set but `name` doesn't parse to an episode marker, else exact equality.
pub fn matches_episode(name: &str, season: Option<u32>, episode: Option<u32>) -> bool {
    episode_matcher::matches_episode(name, season, episode)
}

pub struct QueryBuilder {
    title_index: Arc<TitleIndex>,
}

impl QueryBuilder {
    pub fn new(title_index: Arc<TitleIndex>) -> Self {
        Self { title_index }
    }

    /// Resolve the request id's title metadata and build the primary and
    /// fallback search queries.
    pub async fn build(&self, parsed: &ParsedRequestId) -> Queries {
        let basics = self.title_index.lookup(&parsed.base_id).await;
        self.build_with(parsed, basics.as_ref())
    }

    /// Pure variant for callers that already resolved (or intentionally
    /// omit) title metadata, and for unit testing without a TSV fixture.
    pub fn build_with(&self, parsed: &ParsedRequestId, basics: Option<&TitleBasics>) -> Queries {
        let base_title = basics
            .map(|b| {
                if !b.primary_title.is_empty() {
                    b.primary_title.clone()
                } else {
                    b.original_title.clone()
                }
            })
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| parsed.base_id.clone());

        let episode_suffix = match (parsed.season, parsed.episode) {
            (Some(s), Some(e)) => Some(format!("S{s:02}E{e:02}")),
            _ => None,
        };

        let is_series = episode_suffix.is_some()
            || basics.map(|b| b.is_series()).unwrap_or(false);

        if is_series {
            if let Some(suffix) = &episode_suffix {
                let query = normalize(&format!("{base_title} {suffix}"));
                let fallback_query = normalize(&base_title);
                return Queries {
                    base_title,
                    query,
                    fallback_query: Some(fallback_query),
                    episode_suffix,
                };
            }
        }

        let start_year = basics.and_then(|b| b.start_year);
        let query = match start_year {
            Some(year) => normalize(&format!("{base_title} {year}")),
            None => normalize(&base_title),
        };
        let fallback_candidate = normalize(&base_title);
        let fallback_query = if fallback_candidate != query {
            Some(fallback_candidate)
        } else {
            None
        };

        Queries {
            base_title,
            query,
            fallback_query,
            episode_suffix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_basics() -> TitleBasics {
        TitleBasics {
            tconst: "tt5834204".into(),
            title_type: "tvSeries".into(),
            primary_title: "The Handmaid's Tale".into(),
            original_title: "The Handmaid's Tale".into(),
            is_adult: false,
            start_year: Some(2017),
            end_year: None,
            runtime_minutes: Some(60),
            genres: vec!["Drama".into()],
        }
    }

    fn movie_basics() -> TitleBasics {
        TitleBasics {
            tconst: "tt10872600".into(),
            title_type: "movie".into(),
            primary_title: "Spider-Man: No Way Home".into(),
            original_title: "Spider-Man: No Way Home".into(),
            is_adult: false,
            start_year: Some(2021),
            end_year: None,
            runtime_minutes: Some(148),
            genres: vec!["Action".into()],
        }
    }

    #[test]
    fn normalize_strips_punctuation_and_reattaches_possessives() {
        assert_eq!(normalize("Spider-Man: No Way Home"), "Spider Man No Way Home");
        assert_eq!(normalize("The Handmaid's Tale"), "The Handmaids Tale");
    }

    #[test]
    fn series_with_episode_builds_suffixed_query_and_base_fallback() {
        let qb_parsed = ParsedRequestId {
            base_id: "tt5834204".into(),
            season: Some(2),
            episode: Some(3),
        };
        let builder = QueryBuilder {
            title_index: Arc::new(TitleIndex::new("/nonexistent")),
        };
        let queries = builder.build_with(&qb_parsed, Some(&series_basics()));
        assert_eq!(queries.episode_suffix.as_deref(), Some("S02E03"));
        assert!(queries.query.ends_with("S02E03"));
        assert_eq!(queries.fallback_query.as_deref(), Some("The Handmaids Tale"));
    }

    #[test]
    fn movie_builds_title_plus_year_with_distinct_fallback() {
        let parsed = ParsedRequestId {
            base_id: "tt10872600".into(),
            season: None,
            episode: None,
        };
        let builder = QueryBuilder {
            title_index: Arc::new(TitleIndex::new("/nonexistent")),
        };
        let queries = builder.build_with(&parsed, Some(&movie_basics()));
        assert_eq!(queries.query, "Spider Man No Way Home 2021");
        assert_eq!(
            queries.fallback_query.as_deref(),
            Some("Spider Man No Way Home")
        );
    }

    #[test]
    fn missing_title_basics_falls_back_to_base_id() {
        let parsed = ParsedRequestId {
            base_id: "tt0000000".into(),
            season: None,
            episode: None,
        };
        let builder = QueryBuilder {
            title_index: Arc::new(TitleIndex::new("/nonexistent")),
        };
        let queries = builder.build_with(&parsed, None);
        assert_eq!(queries.query, "tt0000000");
    }

    #[test]
    fn parse_episode_recognizes_all_three_shapes() {
        assert_eq!(parse_episode("Show.S02E03.1080p"), Some((2, 3)));
        assert_eq!(parse_episode("Show Season 2 Episode 3"), Some((2, 3)));
        assert_eq!(parse_episode("Show.2x03.HDTV"), Some((2, 3)));
        assert_eq!(parse_episode("Show.Movie.Edition"), None);
    }

    #[test]
    fn matches_episode_rules() {
        assert!(matches_episode("anything", None, None));
        assert!(matches_episode("Show.S02E03", Some(2), Some(3)));
        assert!(!matches_episode("Show.S02E04", Some(2), Some(3)));
        assert!(!matches_episode("Show.NoMarker", Some(2), Some(3)));
    }
}
