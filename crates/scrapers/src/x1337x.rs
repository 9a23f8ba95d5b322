//! 1337x scraper: HTML listing search, then a detail-page fetch per result
//! to recover its magnet. The site sits behind anti-bot protection more
//! aggressively than the other HTML sources, so its traffic routes through
//! the bypass pool sooner (handled transparently by `HttpClient`).

use async_trait::async_trait;
use streamforge_core::episode_matcher;
use streamforge_core::models::{ParsedRequestId, Stream, TorrentCandidate};
use tracing::debug;

use crate::candidates::{build_stream, dedupe_candidates, rank_by_seeders};
use crate::html_scrape;
use crate::http_client::FetchOpts;
use crate::scraper_trait::{ScrapeContext, Scraper};

const DETAIL_LIMIT: usize = 20;

pub struct X1337xScraper {
    bases: Vec<String>,
}

impl X1337xScraper {
    pub fn new(bases: Vec<String>) -> Self {
        Self { bases }
    }

    async fn search(&self, base: &str, query: &str, ctx: &ScrapeContext) -> Vec<html_scrape::ListingRow> {
        let url = format!("{base}/search/{}/1/", urlencoding::encode(query));
        let opts = FetchOpts::with_cancellation(ctx.cancellation.clone());
        let Some(body) = ctx.http.fetch_text(self.name(), &url, &opts).await else {
            return Vec::new();
        };
        html_scrape::extract_1337x_rows(&body, base)
    }

    async fn recover_magnet(&self, detail_url: &str, ctx: &ScrapeContext) -> Option<String> {
        let opts = FetchOpts::with_cancellation(ctx.cancellation.clone());
        let body = ctx.http.fetch_text(self.name(), detail_url, &opts).await?;
        html_scrape::extract_first_magnet(&body)
    }
}

#[async_trait]
impl Scraper for X1337xScraper {
    fn name(&self) -> &'static str {
        "1337x"
    }

    async fn scrape(&self, parsed: &ParsedRequestId, ctx: &ScrapeContext) -> Vec<Stream> {
        if self.bases.is_empty() || ctx.is_cancelled() {
            return Vec::new();
        }

        let mut rows = Vec::new();
        for base in &self.bases {
            if ctx.is_cancelled() {
                return Vec::new();
            }
            rows.extend(self.search(base, &ctx.queries.query, ctx).await);
        }

        if rows.is_empty() {
            if let (Some(fallback), false) = (&ctx.queries.fallback_query, ctx.is_cancelled()) {
                for base in &self.bases {
                    rows.extend(self.search(base, fallback, ctx).await);
                }
            }
        }

        if let (Some(season), Some(episode)) = (parsed.season, parsed.episode) {
            rows.retain(|r| episode_matcher::matches_episode(&r.name, Some(season), Some(episode)));
        }

        if rows.is_empty() {
            debug!(scraper = self.name(), "no candidates");
            return Vec::new();
        }

        rows.sort_by(|a, b| b.seeders.cmp(&a.seeders));

        let mut candidates = Vec::new();
        for row in rows.into_iter().take(DETAIL_LIMIT) {
            if ctx.is_cancelled() {
                break;
            }
            let Some(magnet) = self.recover_magnet(&row.detail_url, ctx).await else {
                continue;
            };
            candidates.push(TorrentCandidate {
                name: row.name,
                detail_url: Some(row.detail_url),
                magnet: Some(magnet),
                info_hash: None,
                seeders: row.seeders,
                leechers: row.leechers,
                size_bytes: None,
                size_label: row.size_label,
                season: parsed.season,
                episode: parsed.episode,
                source: self.name().to_string(),
            });
        }

        if candidates.is_empty() {
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
