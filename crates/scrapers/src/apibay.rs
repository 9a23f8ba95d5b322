//! ApiBay (The Pirate Bay's JSON search API) scraper. Info hashes are
//! authoritative; magnets are synthesized for the rare case a consumer
//! wants one, but carry no tracker list.

use async_trait::async_trait;
use serde::Deserialize;
use streamforge_core::episode_matcher;
use streamforge_core::models::{ParsedRequestId, Stream, TorrentCandidate};
use tracing::debug;

use crate::candidates::{build_stream, dedupe_candidates, rank_by_seeders};
use crate::http_client::FetchOpts;
use crate::magnet_codec;
use crate::scraper_trait::{ScrapeContext, Scraper};

/// Category ids the movie-flavored instance searches.
pub const MOVIE_CATEGORIES: [&str; 2] = ["207", "201"];
/// Category ids the series-flavored instance searches.
pub const SERIES_CATEGORIES: [&str; 2] = ["208", "205"];

/// ApiBay reports a single placeholder row instead of an empty array when
/// a query has no matches.
const NO_RESULTS_HASH: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Deserialize)]
struct ApibayRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    info_hash: String,
    #[serde(default)]
    seeders: String,
    #[serde(default)]
    leechers: String,
    #[serde(default)]
    size: String,
}

pub struct ApiBayScraper {
    bases: Vec<String>,
    categories: Vec<&'static str>,
}

impl ApiBayScraper {
    pub fn new(bases: Vec<String>, categories: Vec<&'static str>) -> Self {
        Self { bases, categories }
    }

    pub fn for_movies(bases: Vec<String>) -> Self {
        Self::new(bases, MOVIE_CATEGORIES.to_vec())
    }

    pub fn for_series(bases: Vec<String>) -> Self {
        Self::new(bases, SERIES_CATEGORIES.to_vec())
    }

    async fn search(&self, base: &str, category: &str, query: &str, ctx: &ScrapeContext) -> Vec<TorrentCandidate> {
        let url = format!(
            "{base}/q.php?q={}&cat={category}",
            urlencoding::encode(query)
        );
        let opts = FetchOpts::with_cancellation(ctx.cancellation.clone());
        let rows: Option<Vec<ApibayRow>> = ctx.http.fetch_json(self.name(), &url, &opts).await;
        let Some(rows) = rows else {
            return Vec::new();
        };

        rows.into_iter()
            .filter(|r| !r.info_hash.is_empty() && r.info_hash.to_ascii_lowercase() != NO_RESULTS_HASH)
            .map(|r| {
                let hash = r.info_hash.to_ascii_lowercase();
                TorrentCandidate {
                    name: r.name,
                    detail_url: None,
                    magnet: Some(magnet_codec::synthesize(&hash)),
                    info_hash: Some(hash),
                    seeders: r.seeders.parse().unwrap_or(0),
                    leechers: r.leechers.parse().unwrap_or(0),
                    size_bytes: r.size.parse().ok(),
                    size_label: None,
                    season: None,
                    episode: None,
                    source: self.name().to_string(),
                }
            })
            .collect()
    }
}

#[async_trait]
impl Scraper for ApiBayScraper {
    fn name(&self) -> &'static str {
        "ApiBay"
    }

    async fn scrape(&self, parsed: &ParsedRequestId, ctx: &ScrapeContext) -> Vec<Stream> {
        if self.bases.is_empty() || ctx.is_cancelled() {
            return Vec::new();
        }

        let mut futs = Vec::new();
        for base in &self.bases {
            for category in &self.categories {
                futs.push(self.search(base, category, &ctx.queries.query, ctx));
            }
        }
        let mut candidates: Vec<TorrentCandidate> =
            futures::future::join_all(futs).await.into_iter().flatten().collect();

        if candidates.is_empty() && !ctx.is_cancelled() {
            if let Some(fallback) = &ctx.queries.fallback_query {
                let mut futs = Vec::new();
                for base in &self.bases {
                    for category in &self.categories {
                        futs.push(self.search(base, category, fallback, ctx));
                    }
                }
                candidates = futures::future::join_all(futs).await.into_iter().flatten().collect();
            }
        }

        if let (Some(season), Some(episode)) = (parsed.season, parsed.episode) {
            candidates.retain(|c| episode_matcher::matches_episode(&c.name, Some(season), Some(episode)));
        }

        if candidates.is_empty() {
            debug!(scraper = self.name(), "no candidates");
            return Vec::new();
        }

        let mut candidates = dedupe_candidates(candidates);
        rank_by_seeders(&mut candidates);

        candidates
            .iter()
            .filter_map(|c| build_stream(c, &ctx.queries.base_title, parsed))
            .collect()
    }
}
