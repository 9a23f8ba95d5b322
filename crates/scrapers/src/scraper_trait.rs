//! The common contract every per-source scraper implements, and the shared
//! context (queries, cancellation, id) they're invoked with.

use std::sync::Arc;

use async_trait::async_trait;
use streamforge_core::models::{ParsedRequestId, Queries, Stream};
use tokio_util::sync::CancellationToken;

use crate::http_client::HttpClient;

/// Everything a scraper needs beyond its own configured base URLs.
#[derive(Clone)]
pub struct ScrapeContext {
    pub http: Arc<HttpClient>,
    pub queries: Queries,
    pub cancellation: CancellationToken,
}

impl ScrapeContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Stable identity used for bypass-pool keying, cache keys, and logging.
    fn name(&self) -> &'static str;

    /// Candidates this source turned up, each carrying its internal
    /// `seeders` count -- the Aggregator strips it when it builds the final
    /// wire response after merging across every scraper.
    async fn scrape(&self, parsed: &ParsedRequestId, ctx: &ScrapeContext) -> Vec<Stream>;
}
