//! EZTV series scraper. JSON API paginated by IMDb id, with an HTML
//! search-page fallback when the API yields nothing for a specific episode.

use async_trait::async_trait;
use serde::Deserialize;
use streamforge_core::episode_matcher;
use streamforge_core::models::{ParsedRequestId, Stream, TorrentCandidate};
use tracing::debug;

use crate::candidates::{build_stream, dedupe_candidates, rank_by_seeders};
use crate::html_scrape;
use crate::http_client::FetchOpts;
use crate::scraper_trait::{ScrapeContext, Scraper};

const MAX_PAGES: u32 = 50;
const PAGE_CONCURRENCY: usize = 5;
const MAX_SEARCH_LINKS: usize = 15;

#[derive(Debug, Deserialize)]
struct EztvResponse {
    #[serde(default)]
    torrents_count: i64,
    #[serde(default)]
    torrents: Vec<EztvTorrent>,
}

#[derive(Debug, Deserialize)]
struct EztvTorrent {
    title: String,
    #[serde(default)]
    season: String,
    #[serde(default)]
    episode: String,
    #[serde(default)]
    seeds: i64,
    #[serde(default)]
    peers: i64,
    #[serde(default)]
    size_bytes: String,
    #[serde(default)]
    magnet_url: String,
    #[serde(default)]
    episode_url: String,
}

pub struct EztvScraper {
    bases: Vec<String>,
}

impl EztvScraper {
    pub fn new(bases: Vec<String>) -> Self {
        Self { bases }
    }

    async fn fetch_page(
        &self,
        base: &str,
        imdb_id: &str,
        page: u32,
        ctx: &ScrapeContext,
    ) -> Option<EztvResponse> {
        let url = format!("{base}/api/get-torrents?imdb_id={imdb_id}&page={page}");
        let opts = FetchOpts::with_cancellation(ctx.cancellation.clone());
        ctx.http.fetch_json(self.name(), &url, &opts).await
    }

    async fn collect_pages(&self, base: &str, imdb_id: &str, ctx: &ScrapeContext) -> Vec<EztvTorrent> {
        let mut all = Vec::new();
        let mut page = 1;
        let mut expected: Option<i64> = None;

        while page <= MAX_PAGES {
            if ctx.is_cancelled() {
                break;
            }
            let batch_end = (page + PAGE_CONCURRENCY as u32 - 1).min(MAX_PAGES);
            let mut futs = Vec::new();
            for p in page..=batch_end {
                futs.push(self.fetch_page(base, imdb_id, p, ctx));
            }
            let results = futures::future::join_all(futs).await;

            let mut any_empty = false;
            for result in results {
                match result {
                    Some(resp) => {
                        if expected.is_none() {
                            expected = Some(resp.torrents_count);
                        }
                        if resp.torrents.is_empty() {
                            any_empty = true;
                        }
                        all.extend(resp.torrents);
                    }
                    None => any_empty = true,
                }
            }

            if any_empty {
                break;
            }
            if let Some(expected) = expected {
                if all.len() as i64 >= expected {
                    break;
                }
            }
            page = batch_end + 1;
        }

        all
    }

    async fn api_search(&self, base: &str, base_id: &str, ctx: &ScrapeContext) -> Vec<EztvTorrent> {
        let digits = base_id.trim_start_matches("tt");
        let mut torrents = self.collect_pages(base, digits, ctx).await;
        if torrents.is_empty() && !ctx.is_cancelled() {
            torrents = self.collect_pages(base, base_id, ctx).await;
        }
        torrents
    }

    fn episode_of(&self, torrent: &EztvTorrent) -> Option<(u32, u32)> {
        let season: Option<u32> = torrent.season.parse().ok().filter(|v| *v > 0);
        let episode: Option<u32> = torrent.episode.parse().ok().filter(|v| *v > 0);
        match (season, episode) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => episode_matcher::parse_episode(&torrent.title),
        }
    }

    fn to_candidate(&self, torrent: EztvTorrent) -> TorrentCandidate {
        let (season, episode) = self.episode_of(&torrent).unzip();
        TorrentCandidate {
            name: torrent.title,
            detail_url: if torrent.episode_url.is_empty() {
                None
            } else {
                Some(torrent.episode_url)
            },
            magnet: if torrent.magnet_url.is_empty() {
                None
            } else {
                Some(torrent.magnet_url)
            },
            info_hash: None,
            seeders: torrent.seeds,
            leechers: torrent.peers,
            size_bytes: torrent.size_bytes.parse().ok(),
            size_label: None,
            season,
            episode,
            source: self.name().to_string(),
        }
    }

    async fn html_fallback(
        &self,
        base: &str,
        query: &str,
        suffix: &str,
        season: u32,
        episode: u32,
        ctx: &ScrapeContext,
    ) -> Vec<TorrentCandidate> {
        let search_term = format!("{query} {suffix}").replace(' ', "-");
        let url = format!("{base}/search/{search_term}");
        let opts = FetchOpts::with_cancellation(ctx.cancellation.clone());
        let Some(body) = ctx.http.fetch_text(self.name(), &url, &opts).await else {
            return Vec::new();
        };

        let links = html_scrape::extract_links_with_prefix(&body, "/ep/", MAX_SEARCH_LINKS);
        let mut out = Vec::new();
        for link in links {
            if ctx.is_cancelled() {
                break;
            }
            let detail_url = html_scrape::resolve_url(base, &link);
            let opts = FetchOpts::with_cancellation(ctx.cancellation.clone());
            let Some(detail) = ctx.http.fetch_text(self.name(), &detail_url, &opts).await else {
                continue;
            };
            let title = html_scrape::extract_title(&detail).unwrap_or_default();
            if !episode_matcher::matches_episode(&title, Some(season), Some(episode)) {
                continue;
            }
            let Some(magnet) = html_scrape::extract_first_magnet(&detail) else {
                continue;
            };
            out.push(TorrentCandidate {
                name: title,
                detail_url: Some(detail_url),
                magnet: Some(magnet),
                info_hash: None,
                seeders: 0,
                leechers: 0,
                size_bytes: None,
                size_label: None,
                season: Some(season),
                episode: Some(episode),
                source: self.name().to_string(),
            });
        }
        out
    }
}

#[async_trait]
impl Scraper for EztvScraper {
    fn name(&self) -> &'static str {
        "EZTV"
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
            let torrents = self.api_search(base, &parsed.base_id, ctx).await;
            candidates.extend(torrents.into_iter().map(|t| self.to_candidate(t)));
        }

        if let (Some(season), Some(episode)) = (parsed.season, parsed.episode) {
            candidates.retain(|c| episode_matcher::matches_episode(&c.name, Some(season), Some(episode)));

            if candidates.is_empty() && !ctx.is_cancelled() {
                for base in &self.bases {
                    let fallback = self
                        .html_fallback(
                            base,
                            &ctx.queries.base_title,
                            ctx.queries.episode_suffix.as_deref().unwrap_or(""),
                            season,
                            episode,
                            ctx,
                        )
                        .await;
                    candidates.extend(fallback);
                }
            }
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
