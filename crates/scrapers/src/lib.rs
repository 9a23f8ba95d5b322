//! HTTP layer with anti-bot bypass fallback, and the per-source torrent
//! scrapers (YTS, EZTV, TorrentGalaxy, ApiBay, 1337x) that turn it into
//! normalized [`StreamResponse`](streamforge_core::models::StreamResponse)s.

pub mod apibay;
pub mod candidates;
pub mod display_formatter;
pub mod eztv;
pub mod html_scrape;
pub mod http_client;
pub mod magnet_codec;
pub mod quality_tagger;
pub mod scraper_trait;
pub mod size_parser;
pub mod torrentgalaxy;
pub mod x1337x;
pub mod yts;

pub use apibay::ApiBayScraper;
pub use eztv::EztvScraper;
pub use http_client::{BypassConfig, FetchOpts, HttpClient};
pub use scraper_trait::{ScrapeContext, Scraper};
pub use torrentgalaxy::TorrentGalaxyScraper;
pub use x1337x::X1337xScraper;
pub use yts::YtsScraper;
