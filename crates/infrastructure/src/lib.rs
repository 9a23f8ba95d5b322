//! Cache backends and the IMDb dataset refresher -- the external
//! collaborators the aggregation pipeline depends on but doesn't implement
//! itself.

pub mod cache;
pub mod imdb;

pub use cache::{Cache, CacheError, CacheExt, CacheKey, CacheManager, MemoryCache};
pub use imdb::{ImdbRefreshError, ImdbRefresher};
