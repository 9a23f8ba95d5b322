//! TorrentGalaxy scraper: HTML listing search, then a bounded number of
//! detail-page fetches to recover each result's magnet.

use async_trait::async_trait;
use streamforge_core::episode_matcher;
use streamforge_core::models::{ParsedRequestId, Stream, TorrentCandidate};
use tracing::debug;

use crate::candidates::{build_stream, dedupe_candidates, rank_by_seeders};
use crate::html_scrape;
use crate::http_client::FetchOpts;
use crate::scraper_trait::{ScrapeContext, Scraper};

const TGX_DETAIL_LIMIT: usize = 20;

pub struct TorrentGalaxyScraper {
    bases: Vec<String>,
}

impl TorrentGalaxyScraper {
    pub fn new(bases: Vec<String>) -> Self {
        Self { bases }
    }

    async fn search(&self, base: &str, query: &str, ctx: &ScrapeContext) -> Vec<html_scrape::ListingRow> {
        let url = format!(
            "{base}/lmsearch?q={}&category=lmsearch&page=1",
            urlencoding::encode(query)
        );
        let opts = FetchOpts::with_cancellation(ctx.cancellation.clone());
        let Some(body) = ctx.http.fetch_text(self.name(), &url, &opts).await else {
            return Vec::new();
        };
        html_scrape::extract_tgx_rows(&body, base)
    }

    async fn recover_magnet(&self, detail_url: &str, ctx: &ScrapeContext) -> Option<String> {
        let opts = FetchOpts::with_cancellation(ctx.cancellation.clone());
        let body = ctx.http.fetch_text(self.name(), detail_url, &opts).await?;
        html_scrape::extract_first_magnet(&body)
    }
}

#[async_trait]
impl Scraper for TorrentGalaxyScraper {
    fn name(&self) -> &'static str {
        "TorrentGalaxy"
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
        for row in rows.into_iter().take(TGX_DETAIL_LIMIT) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use streamforge_core::models::Queries;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx(http: Arc<crate::http_client::HttpClient>) -> ScrapeContext {
        ScrapeContext {
            http,
            queries: Queries {
                base_title: "Movie".into(),
                query: "Movie 2021".into(),
                fallback_query: Some("Movie".into()),
                episode_suffix: None,
            },
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn recovers_magnet_from_detail_page() {
        let server = MockServer::start().await;
        let listing = format!(
            r#"<table class="table-list-wrap"><tbody><tr>
                <a class="cellMainLink" href="/1234/movie-name">Movie.2021.1080p</a>
                <span class="tgxtableSeed">42</span>
                <span class="tgxtableLeech">3</span>
                <span class="tgxtablesize">1.4 GB</span>
            </tr></tbody></table>"#
        );
        Mock::given(method("GET"))
            .and(path("/lmsearch"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing))
            .mount(&server)
            .await;

        let hash = "a".repeat(40);
        let detail = format!(r#"<a href="magnet:?xt=urn:btih:{hash}">magnet</a>"#);
        Mock::given(method("GET"))
            .and(path("/1234/movie-name"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail))
            .mount(&server)
            .await;

        let http = Arc::new(crate::http_client::HttpClient::new(None));
        let scraper = TorrentGalaxyScraper::new(vec![server.uri()]);
        let parsed = ParsedRequestId {
            base_id: "tt1".into(),
            season: None,
            episode: None,
        };
        let streams = scraper.scrape(&parsed, &ctx(http)).await;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].info_hash.as_deref(), Some(hash.as_str()));
    }

    #[tokio::test]
    async fn returns_empty_without_configured_bases() {
        let http = Arc::new(crate::http_client::HttpClient::new(None));
        let scraper = TorrentGalaxyScraper::new(vec![]);
        let parsed = ParsedRequestId {
            base_id: "tt1".into(),
            season: None,
            episode: None,
        };
        assert!(scraper.scrape(&parsed, &ctx(http)).await.is_empty());
    }
}
