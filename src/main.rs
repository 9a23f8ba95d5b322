//! Streamforge -- unified application entry point.
//!
//! Loads configuration, refreshes the IMDb dataset if stale, wires the
//! scraper/aggregator/cache stack together, and serves the addon protocol
//! over HTTP.

use std::sync::Arc;
use std::time::Duration;

use streamforge_aggregator::pipeline::{Aggregator, AggregatorContext};
use streamforge_aggregator::TitleIndex;
use streamforge_api::{create_router, AppState};
use streamforge_core::Result;
use streamforge_infrastructure::cache::{Cache, CacheManager, MemoryCache};
use streamforge_infrastructure::ImdbRefresher;
use streamforge_scrapers::{ApiBayScraper, BypassConfig, EztvScraper, HttpClient, Scraper, TorrentGalaxyScraper, X1337xScraper, YtsScraper};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(&config.logging);
    config.validate()?;
    info!(host = %config.server.host, port = config.server.port, "starting streamforge");

    let imdb = ImdbRefresher::new(config.imdb.tsv_path.clone(), config.imdb.refresh_url.clone());
    imdb.refresh_if_stale().await;

    let aggregator = Arc::new(build_aggregator(&config).await);

    let router = create_router(
        AppState { aggregator },
        Duration::from_secs(config.request.max_wait_seconds.unwrap_or(20) + 10),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| streamforge_core::error::CoreError::ExternalServiceError {
            service: "http_server".to_string(),
            error: format!("failed to bind {addr}: {e}"),
        })?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| streamforge_core::error::CoreError::ExternalServiceError {
            service: "http_server".to_string(),
            error: e.to_string(),
        })?;

    info!("streamforge shutting down");
    Ok(())
}

fn init_logging(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn build_aggregator(config: &AppConfig) -> Aggregator {
    let bypass = config.bypass.url.clone().map(|url| BypassConfig {
        url,
        sessions_per_pool: config.bypass.sessions_per_pool,
        refresh_interval: Duration::from_millis(config.bypass.refresh_interval_ms),
    });
    let http = Arc::new(HttpClient::new(bypass));

    init_scraper_pools(&http, config).await;
    spawn_pool_refresh(http.clone(), Duration::from_millis(config.bypass.refresh_interval_ms));

    let movie_scrapers: Vec<Arc<dyn Scraper>> = [
        non_empty(&config.scrapers.yts_urls).map(|urls| Arc::new(YtsScraper::new(urls)) as Arc<dyn Scraper>),
        non_empty(&config.scrapers.tgx_urls)
            .map(|urls| Arc::new(TorrentGalaxyScraper::new(urls)) as Arc<dyn Scraper>),
        non_empty(&config.scrapers.apibay_urls)
            .map(|urls| Arc::new(ApiBayScraper::for_movies(urls)) as Arc<dyn Scraper>),
        non_empty(&config.scrapers.x1337x_urls)
            .map(|urls| Arc::new(X1337xScraper::new(urls)) as Arc<dyn Scraper>),
    ]
    .into_iter()
    .flatten()
    .collect();

    let series_scrapers: Vec<Arc<dyn Scraper>> = [
        non_empty(&config.scrapers.eztv_urls).map(|urls| Arc::new(EztvScraper::new(urls)) as Arc<dyn Scraper>),
        non_empty(&config.scrapers.tgx_urls)
            .map(|urls| Arc::new(TorrentGalaxyScraper::new(urls)) as Arc<dyn Scraper>),
        non_empty(&config.scrapers.apibay_urls)
            .map(|urls| Arc::new(ApiBayScraper::for_series(urls)) as Arc<dyn Scraper>),
        non_empty(&config.scrapers.x1337x_urls)
            .map(|urls| Arc::new(X1337xScraper::new(urls)) as Arc<dyn Scraper>),
    ]
    .into_iter()
    .flatten()
    .collect();

    let cache = build_cache(config).await;
    let title_index = Arc::new(TitleIndex::new(config.imdb.tsv_path.clone()));

    Aggregator::new(AggregatorContext {
        http,
        title_index,
        cache,
        movie_scrapers,
        series_scrapers,
        cache_ttl: Duration::from_secs(config.cache.redis_ttl_hours * 3600),
        max_wait: config.request.max_wait_seconds.map(Duration::from_secs),
    })
}

fn non_empty(urls: &[String]) -> Option<Vec<String>> {
    (!urls.is_empty()).then(|| urls.to_vec())
}

/// Probe each enabled scraper's front page once at startup so a pool that
/// needs to force-bypass from the start (rather than discovering it on the
/// first live request) is warmed before traffic arrives.
async fn init_scraper_pools(http: &HttpClient, config: &AppConfig) {
    let pool_size = config.bypass.sessions_per_pool;
    let scrapers: [(&str, &[String]); 5] = [
        ("YTS", &config.scrapers.yts_urls),
        ("EZTV", &config.scrapers.eztv_urls),
        ("TorrentGalaxy", &config.scrapers.tgx_urls),
        ("ApiBay", &config.scrapers.apibay_urls),
        ("1337x", &config.scrapers.x1337x_urls),
    ];
    for (name, urls) in scrapers {
        let Some(base) = urls.first() else { continue };
        http.init_scraper(name, base, base, pool_size).await;
    }
}

/// Re-arms itself on `refresh_interval_ms` regardless of pool state, warming
/// every force-bypass pool's sessions (replacing any that fail to warm).
fn spawn_pool_refresh(http: Arc<HttpClient>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            http.refresh_all_pools().await;
        }
    });
}

/// `MemoryCache` alone, or layered in front of `RedisCache` when a redis
/// url is configured -- a warm in-process hit never round-trips to the
/// network.
async fn build_cache(config: &AppConfig) -> Arc<dyn Cache> {
    let memory = Arc::new(MemoryCache::new());
    let Some(redis_url) = config.cache.redis_url.clone() else {
        return memory;
    };

    match streamforge_infrastructure::cache::RedisCache::connect(&redis_url).await {
        Ok(redis) => {
            info!("redis cache backend connected");
            Arc::new(CacheManager::new(vec![memory, Arc::new(redis)]))
        }
        Err(error) => {
            warn!(%error, "failed to connect to redis, falling back to in-process cache only");
            memory
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
