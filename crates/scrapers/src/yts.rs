//! YTS movie scraper. JSON API, magnet-less -- every torrent carries an
//! authoritative info hash directly.

use async_trait::async_trait;
use serde::Deserialize;
use streamforge_core::models::{ParsedRequestId, Stream, TorrentCandidate};
use tracing::debug;

use crate::candidates::{build_stream, dedupe_candidates, rank_by_seeders};
use crate::http_client::FetchOpts;
use crate::scraper_trait::{ScrapeContext, Scraper};

#[derive(Debug, Deserialize)]
struct YtsResponse {
    data: Option<YtsData>,
}

#[derive(Debug, Deserialize)]
struct YtsData {
    #[serde(default)]
    movies: Vec<YtsMovie>,
}

#[derive(Debug, Deserialize)]
struct YtsMovie {
    imdb_code: String,
    #[serde(default)]
    torrents: Vec<YtsTorrent>,
}

#[derive(Debug, Deserialize)]
struct YtsTorrent {
    hash: String,
    #[serde(default)]
    seeds: i64,
    #[serde(default)]
    peers: i64,
    #[serde(default)]
    size_bytes: Option<u64>,
    #[serde(default)]
    quality: String,
    #[serde(default)]
    #[serde(rename = "type")]
    kind: String,
}

pub struct YtsScraper {
    bases: Vec<String>,
}

impl YtsScraper {
    pub fn new(bases: Vec<String>) -> Self {
        Self { bases }
    }

    async fn search(&self, base: &str, base_id: &str, ctx: &ScrapeContext) -> Vec<TorrentCandidate> {
        let url = format!(
            "{base}/api/v2/list_movies.json?query_term={base_id}&limit=1"
        );
        let opts = FetchOpts::with_cancellation(ctx.cancellation.clone());
        let response: Option<YtsResponse> = ctx.http.fetch_json(self.name(), &url, &opts).await;
        let Some(response) = response else {
            return Vec::new();
        };
        let Some(data) = response.data else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for movie in data.movies {
            if movie.imdb_code != base_id {
                continue;
            }
            for torrent in movie.torrents {
                let quality = format!("{} {}", torrent.quality, torrent.kind)
                    .trim()
                    .to_string();
                out.push(TorrentCandidate {
                    name: quality.clone(),
                    detail_url: None,
                    magnet: None,
                    info_hash: Some(torrent.hash.to_ascii_lowercase()),
                    seeders: torrent.seeds,
                    leechers: torrent.peers,
                    size_bytes: torrent.size_bytes,
                    size_label: None,
                    season: None,
                    episode: None,
                    source: self.name().to_string(),
                });
            }
        }
        out
    }
}

#[async_trait]
impl Scraper for YtsScraper {
    fn name(&self) -> &'static str {
        "YTS"
    }

    async fn scrape(&self, parsed: &ParsedRequestId, ctx: &ScrapeContext) -> Vec<Stream> {
        if self.bases.is_empty() || ctx.is_cancelled() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for base in &self.bases {
            if ctx.is_cancelled() {
                return Vec::new();
            }
            candidates.extend(self.search(base, &parsed.base_id, ctx).await);
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

#[cfg(test)]
mod tests {
    use super::*;
    use streamforge_core::models::Queries;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx(http: Arc<crate::http_client::HttpClient>) -> ScrapeContext {
        ScrapeContext {
            http,
            queries: Queries {
                base_title: "Movie".into(),
                query: "Movie".into(),
                fallback_query: None,
                episode_suffix: None,
            },
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn builds_streams_from_matching_imdb_code() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "data": {
                "movies": [{
                    "imdb_code": "tt10872600",
                    "torrents": [{
                        "hash": "ABCDEF0123456789ABCDEF0123456789ABCDEF01",
                        "seeds": 50,
                        "peers": 3,
                        "size_bytes": 1_500_000_000u64,
                        "quality": "1080p",
                        "type": "bluray"
                    }]
                }]
            }
        });
        Mock::given(method("GET"))
            .and(path("/api/v2/list_movies.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let http = Arc::new(crate::http_client::HttpClient::new(None));
        let scraper = YtsScraper::new(vec![server.uri()]);
        let parsed = ParsedRequestId {
            base_id: "tt10872600".into(),
            season: None,
            episode: None,
        };
        let streams = scraper.scrape(&parsed, &ctx(http)).await;
        assert_eq!(streams.len(), 1);
        assert_eq!(
            streams[0].info_hash.as_deref(),
            Some("abcdef0123456789abcdef0123456789abcdef01")
        );
    }

    #[tokio::test]
    async fn skips_movies_with_a_different_imdb_code() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "data": { "movies": [{"imdb_code": "tt9999999", "torrents": []}] }
        });
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let http = Arc::new(crate::http_client::HttpClient::new(None));
        let scraper = YtsScraper::new(vec![server.uri()]);
        let parsed = ParsedRequestId {
            base_id: "tt10872600".into(),
            season: None,
            episode: None,
        };
        let streams = scraper.scrape(&parsed, &ctx(http)).await;
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn returns_empty_without_configured_bases() {
        let http = Arc::new(crate::http_client::HttpClient::new(None));
        let scraper = YtsScraper::new(vec![]);
        let parsed = ParsedRequestId {
            base_id: "tt1".into(),
            season: None,
            episode: None,
        };
        assert!(scraper.scrape(&parsed, &ctx(http)).await.is_empty());
    }
}
