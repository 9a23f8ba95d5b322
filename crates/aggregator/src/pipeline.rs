//! The Aggregator: parses a request id, serves from cache on a hit, and
//! otherwise fans out to the configured scrapers under a soft deadline,
//! merging their results into a ranked, deduplicated response.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use streamforge_core::error::CoreError;
use streamforge_core::models::{MediaType, ParsedRequestId, Stream, StreamResponse};
use streamforge_infrastructure::cache::{Cache, CacheExt, CacheKey};
use streamforge_scrapers::{quality_tagger, HttpClient, ScrapeContext, Scraper};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::id_parser;
use crate::query_builder::QueryBuilder;
use crate::title_index::TitleIndex;

/// Shared collaborators the Aggregator is built from, grouped so a test can
/// construct one cheaply and a production binary can construct exactly one
/// per process. Scraper lists are fixed per media type at construction
/// time, in the call order the ordering guarantee requires.
pub struct AggregatorContext {
    pub http: Arc<HttpClient>,
    pub title_index: Arc<TitleIndex>,
    pub cache: Arc<dyn Cache>,
    pub movie_scrapers: Vec<Arc<dyn Scraper>>,
    pub series_scrapers: Vec<Arc<dyn Scraper>>,
    pub cache_ttl: Duration,
    pub max_wait: Option<Duration>,
}

pub struct Aggregator {
    ctx: AggregatorContext,
    query_builder: QueryBuilder,
}

impl Aggregator {
    pub fn new(ctx: AggregatorContext) -> Self {
        let query_builder = QueryBuilder::new(ctx.title_index.clone());
        Self { ctx, query_builder }
    }

    /// Resolve `(type, id)` into a ranked, deduplicated stream list, serving
    /// from cache when possible.
    pub async fn handle_stream(&self, media_type: &str, id: &str) -> Result<StreamResponse, CoreError> {
        let media_type = MediaType::parse(media_type)
            .ok_or_else(|| CoreError::InvalidRequest { reason: format!("unknown type '{media_type}'") })?;
        let parsed = id_parser::parse(id).map_err(|e| CoreError::InvalidRequest { reason: e.to_string() })?;

        let cache_key = CacheKey::stream(media_type.as_str(), &parsed.base_id, parsed.season, parsed.episode);

        if let Some(cached) = self.ctx.cache.get::<StreamResponse>(&cache_key).await {
            info!(
                media_type = media_type.as_str(),
                id,
                cache_hit = true,
                "stream request served from cache"
            );
            return Ok(cached);
        }

        let start = Instant::now();
        let queries = self.query_builder.build(&parsed).await;
        let imdb_title = queries.base_title.clone();

        let scrapers: &[Arc<dyn Scraper>] = match media_type {
            MediaType::Movie => &self.ctx.movie_scrapers,
            MediaType::Series => &self.ctx.series_scrapers,
        };

        let cancellation = CancellationToken::new();
        let deadline_guard = self.ctx.max_wait.map(|wait| {
            let token = cancellation.clone();
            tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                token.cancel();
            })
        });

        let scrape_ctx = ScrapeContext {
            http: self.ctx.http.clone(),
            queries,
            cancellation: cancellation.clone(),
        };

        let futs = scrapers.iter().cloned().map(|scraper| {
            let parsed = parsed.clone();
            let scrape_ctx = scrape_ctx.clone();
            async move {
                let streams = scraper.scrape(&parsed, &scrape_ctx).await;
                (scraper.name(), streams)
            }
        });
        let results = futures::future::join_all(futs).await;

        if let Some(handle) = deadline_guard {
            handle.abort();
        }
        let cancelled = cancellation.is_cancelled();

        let mut source_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut magnet_links = 0usize;
        let mut merged: Vec<Stream> = Vec::new();
        let mut index_of: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

        for (name, streams) in results {
            source_counts.insert(name.to_string(), streams.len());
            for stream in streams {
                if stream.info_hash.is_some() || stream.url.as_deref().is_some_and(|u| u.starts_with("magnet:?")) {
                    magnet_links += 1;
                }
                let key = stream.identity_key().to_string();
                match index_of.get(&key) {
                    Some(&i) => merged[i].merge_sources(&stream),
                    None => {
                        index_of.insert(key, merged.len());
                        merged.push(stream);
                    }
                }
            }
        }

        merged.retain(|s| !s.is_dead_magnet());
        merged.sort_by(|a, b| b.seeders.cmp(&a.seeders));

        if media_type == MediaType::Series {
            for stream in &mut merged {
                let quality = quality_tagger::extract(&stream.name)
                    .or_else(|| quality_tagger::extract(&stream.description))
                    .unwrap_or("unknown");
                stream.behavior_hints.binge_group = Some(format!("barestreams-{}-{quality}", slugify(&stream.name)));
            }
        }

        let response = StreamResponse::from_streams(&merged);
        let duration_ms = start.elapsed().as_millis() as u64;

        if !cancelled && !response.streams.is_empty() {
            let _ = self.ctx.cache.set(&cache_key, &response, self.ctx.cache_ttl).await;
        }

        info!(
            media_type = media_type.as_str(),
            id,
            imdb_title = %imdb_title,
            cache_hit = false,
            duration_ms,
            magnet_links,
            sources = ?source_counts,
            "stream request resolved"
        );

        Ok(response)
    }
}

/// Lowercase-alphanumeric runs joined by `-`, used for the `bingeGroup`
/// source segment (e.g. `"TorrentGalaxy"` -> `"torrentgalaxy"`).
fn slugify(s: &str) -> String {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| chunk.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use streamforge_core::models::BehaviorHints;
    use streamforge_infrastructure::cache::MemoryCache;

    struct StubScraper {
        name: &'static str,
        streams: Vec<Stream>,
    }

    #[async_trait]
    impl Scraper for StubScraper {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn scrape(&self, _parsed: &ParsedRequestId, _ctx: &ScrapeContext) -> Vec<Stream> {
            self.streams.clone()
        }
    }

    fn stream(name: &str, hash: &str, seeders: i64) -> Stream {
        stream_with_description(name, "", hash, seeders)
    }

    fn stream_with_description(name: &str, description: &str, hash: &str, seeders: i64) -> Stream {
        Stream {
            name: name.to_string(),
            description: description.to_string(),
            info_hash: Some(hash.to_string()),
            url: None,
            sources: vec![],
            behavior_hints: BehaviorHints::default(),
            seeders,
        }
    }

    fn ctx_with(movie_scrapers: Vec<Arc<dyn Scraper>>, series_scrapers: Vec<Arc<dyn Scraper>>) -> AggregatorContext {
        AggregatorContext {
            http: Arc::new(HttpClient::new(None)),
            title_index: Arc::new(TitleIndex::new("/nonexistent")),
            cache: Arc::new(MemoryCache::new()),
            movie_scrapers,
            series_scrapers,
            cache_ttl: Duration::from_secs(3600),
            max_wait: Some(Duration::from_secs(5)),
        }
    }

    #[tokio::test]
    async fn invalid_type_is_rejected_before_any_scrape() {
        let aggregator = Aggregator::new(ctx_with(vec![], vec![]));
        let err = aggregator.handle_stream("album", "tt1").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn invalid_id_is_rejected_before_any_scrape() {
        let aggregator = Aggregator::new(ctx_with(vec![], vec![]));
        let err = aggregator.handle_stream("movie", "not-an-id").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn merges_duplicate_identity_and_ranks_by_seeders() {
        let hash = "a".repeat(40);
        let yts = Arc::new(StubScraper {
            name: "YTS",
            streams: vec![stream("YTS 1080p", &hash, 10)],
        });
        let tgx = Arc::new(StubScraper {
            name: "TorrentGalaxy",
            streams: vec![stream("TGX 1080p", &hash, 40), stream("TGX 720p", &"b".repeat(40), 5)],
        });
        let aggregator = Aggregator::new(ctx_with(vec![yts, tgx], vec![]));

        let response = aggregator.handle_stream("movie", "tt10872600").await.unwrap();
        assert_eq!(response.streams.len(), 2);
        assert_eq!(response.streams[0].info_hash.as_deref(), Some(hash.as_str()));
    }

    #[tokio::test]
    async fn drops_dead_magnets() {
        let dead = Arc::new(StubScraper {
            name: "YTS",
            streams: vec![stream("YTS dead", &"c".repeat(40), 0)],
        });
        let aggregator = Aggregator::new(ctx_with(vec![dead], vec![]));

        let response = aggregator.handle_stream("movie", "tt10872600").await.unwrap();
        assert!(response.streams.is_empty());
    }

    #[tokio::test]
    async fn series_responses_carry_binge_group_with_quality_suffix() {
        let eztv = Arc::new(StubScraper {
            name: "EZTV",
            streams: vec![stream_with_description(
                "EZTV",
                "Show.S02E03.1080p (EZTV)",
                &"d".repeat(40),
                20,
            )],
        });
        let aggregator = Aggregator::new(ctx_with(vec![], vec![eztv]));

        let response = aggregator.handle_stream("series", "tt5834204:2:3").await.unwrap();
        let binge_group = response.streams[0].behavior_hints.as_ref().unwrap().binge_group.clone().unwrap();
        assert_eq!(binge_group, "barestreams-eztv-1080p");
    }

    #[tokio::test]
    async fn second_request_for_same_key_is_served_from_cache() {
        let eztv = Arc::new(StubScraper {
            name: "EZTV",
            streams: vec![stream("Show.S02E03.1080p", &"e".repeat(40), 20)],
        });
        let aggregator = Aggregator::new(ctx_with(vec![], vec![eztv]));

        let first = aggregator.handle_stream("series", "tt5834204:2:3").await.unwrap();
        let second = aggregator.handle_stream("series", "tt5834204:2:3").await.unwrap();
        assert_eq!(first.streams.len(), second.streams.len());
    }

    #[tokio::test]
    async fn empty_results_are_not_cached() {
        let aggregator = Aggregator::new(ctx_with(vec![], vec![]));
        let response = aggregator.handle_stream("movie", "tt10872600").await.unwrap();
        assert!(response.streams.is_empty());

        let key = CacheKey::stream("movie", "tt10872600", None, None);
        assert!(aggregator.ctx.cache.get::<StreamResponse>(&key).await.is_none());
    }

    #[test]
    fn slugify_lowercases_and_joins_alphanumeric_runs() {
        assert_eq!(slugify("TorrentGalaxy"), "torrentgalaxy");
        assert_eq!(slugify("1337x"), "1337x");
    }
}
