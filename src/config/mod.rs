//! Application configuration: everything loaded from the environment at
//! startup, plus validation of the resulting shape.

use streamforge_core::error::CoreError;
use streamforge_core::Result;
use std::env;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7000,
            request_timeout_secs: 30,
        }
    }
}

/// Base URLs configured per torrent source. Empty lists disable a source.
#[derive(Debug, Clone, Default)]
pub struct ScraperConfig {
    pub yts_urls: Vec<String>,
    pub eztv_urls: Vec<String>,
    pub tgx_urls: Vec<String>,
    pub apibay_urls: Vec<String>,
    pub x1337x_urls: Vec<String>,
}

/// The anti-bot bypass service, if one is configured.
#[derive(Debug, Clone, Default)]
pub struct BypassSettings {
    pub url: Option<String>,
    pub sessions_per_pool: usize,
    pub refresh_interval_ms: u64,
}

/// Cache backend selection and TTL.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    pub redis_ttl_hours: u64,
    pub memory_ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_ttl_hours: 6,
            memory_ttl_hours: 6,
        }
    }
}

/// Per-request fan-out deadline.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub max_wait_seconds: Option<u64>,
}

/// Where the IMDb dataset lives and where to refresh it from.
#[derive(Debug, Clone)]
pub struct ImdbConfig {
    pub tsv_path: String,
    pub refresh_url: Option<String>,
}

impl Default for ImdbConfig {
    fn default() -> Self {
        Self {
            tsv_path: "./data/title.basics.tsv".to_string(),
            refresh_url: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Complete application configuration, assembled once at startup.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub scrapers: ScraperConfig,
    pub bypass: BypassSettings,
    pub cache: CacheConfig,
    pub request: RequestConfig,
    pub imdb: ImdbConfig,
    pub logging: LoggingConfig,
}

/// Comma-separated list, trimmed, with empty entries dropped.
fn split_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| CoreError::ConfigurationError {
            field: key.to_string(),
            message: format!("invalid value '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("STREAMFORGE_HOST") {
            config.server.host = host;
        }
        config.server.port = parse_env("STREAMFORGE_PORT", config.server.port)?;
        config.server.request_timeout_secs =
            parse_env("STREAMFORGE_REQUEST_TIMEOUT_SECS", config.server.request_timeout_secs)?;

        if let Ok(raw) = env::var("YTS_URL") {
            config.scrapers.yts_urls = split_urls(&raw);
        }
        if let Ok(raw) = env::var("EZTV_URL") {
            config.scrapers.eztv_urls = split_urls(&raw);
        }
        if let Ok(raw) = env::var("TGX_URL") {
            config.scrapers.tgx_urls = split_urls(&raw);
        }
        if let Ok(raw) = env::var("APIBAY_URL") {
            config.scrapers.apibay_urls = split_urls(&raw);
        }
        if let Ok(raw) = env::var("X1337X_URL") {
            config.scrapers.x1337x_urls = split_urls(&raw);
        }

        if let Ok(url) = env::var("FLARESOLVERR_URL") {
            config.bypass.url = Some(url);
        }
        config.bypass.sessions_per_pool = parse_env("FLARESOLVERR_SESSIONS", 3usize)?;
        config.bypass.refresh_interval_ms = parse_env("FLARESOLVERR_SESSION_REFRESH_MS", 600_000u64)?;

        if let Ok(url) = env::var("REDIS_URL") {
            config.cache.redis_url = Some(url);
        }
        config.cache.redis_ttl_hours = parse_env("REDIS_TTL_HOURS", config.cache.redis_ttl_hours)?;
        config.cache.memory_ttl_hours = parse_env("CACHE_MEMORY_TTL_HOURS", config.cache.memory_ttl_hours)?;

        if let Ok(raw) = env::var("MAX_REQUEST_WAIT_SECONDS") {
            config.request.max_wait_seconds = Some(raw.parse().map_err(|_| CoreError::ConfigurationError {
                field: "MAX_REQUEST_WAIT_SECONDS".to_string(),
                message: format!("invalid value '{raw}'"),
            })?);
        }

        if let Ok(path) = env::var("IMDB_TSV_PATH") {
            config.imdb.tsv_path = path;
        }
        if let Ok(url) = env::var("IMDB_REFRESH_URL") {
            config.imdb.refresh_url = Some(url);
        }

        if let Ok(level) = env::var("RUST_LOG") {
            config.logging.level = level;
        }
        if let Ok(json_format) = env::var("LOG_JSON_FORMAT") {
            config.logging.json_format = json_format.parse().unwrap_or(false);
        }

        Ok(config)
    }

    /// Reject a configuration with no usable scraper for one of the media
    /// types, since such a deployment could never answer a request for it.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(CoreError::ConfigurationError {
                field: "server.port".to_string(),
                message: "port must be greater than 0".to_string(),
            });
        }

        let has_movie_source = !self.scrapers.yts_urls.is_empty()
            || !self.scrapers.tgx_urls.is_empty()
            || !self.scrapers.apibay_urls.is_empty()
            || !self.scrapers.x1337x_urls.is_empty();
        if !has_movie_source {
            return Err(CoreError::ConfigurationError {
                field: "scrapers".to_string(),
                message: "at least one movie-capable scraper must be configured".to_string(),
            });
        }

        let has_series_source = !self.scrapers.eztv_urls.is_empty()
            || !self.scrapers.tgx_urls.is_empty()
            || !self.scrapers.apibay_urls.is_empty()
            || !self.scrapers.x1337x_urls.is_empty();
        if !has_series_source {
            return Err(CoreError::ConfigurationError {
                field: "scrapers".to_string(),
                message: "at least one series-capable scraper must be configured".to_string(),
            });
        }

        if self.bypass.url.is_some() && self.bypass.sessions_per_pool == 0 {
            return Err(CoreError::ConfigurationError {
                field: "bypass.sessions_per_pool".to_string(),
                message: "must be greater than 0 when a bypass service is configured".to_string(),
            });
        }

        Ok(())
    }
}
