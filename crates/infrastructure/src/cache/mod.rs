use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis::RedisCache;

/// Object-safe cache backend. Values cross this boundary pre-serialized so
/// the trait can be used behind `Arc<dyn Cache>` -- see `CacheExt` for the
/// typed `get`/`set` most callers actually want.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Raw serialized value for a key, if present and unexpired.
    async fn get_raw(&self, key: &str) -> Option<String>;

    /// Store an already-serialized value with a TTL.
    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a value from the cache
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Clear all values from the cache
    async fn clear(&self) -> Result<(), CacheError>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> bool;

    /// Get the remaining TTL for a key
    async fn ttl(&self, key: &str) -> Option<Duration>;
}

/// Typed convenience layer over [`Cache`], blanket-implemented so every
/// backend gets `get`/`set` for free without making the trait itself
/// generic (and therefore non-dyn-safe).
#[async_trait]
pub trait CacheExt: Cache {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::debug!(key, %error, "cache entry failed to deserialize");
                None
            }
        }
    }

    async fn set<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set_raw(key, raw, ttl).await
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("key not found")]
    KeyNotFound,
}

/// Cache layers tried in order; a hit in a later layer back-fills earlier
/// ones so the next lookup for the same key is served from the front.
/// Implements `Cache` itself so a layered stack can sit behind the same
/// `Arc<dyn Cache>` a single backend would.
pub struct CacheManager {
    layers: Vec<Arc<dyn Cache>>,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(vec![Arc::new(MemoryCache::new())])
    }
}

impl CacheManager {
    pub fn new(layers: Vec<Arc<dyn Cache>>) -> Self {
        Self { layers }
    }

    pub fn with_layer(mut self, cache: Arc<dyn Cache>) -> Self {
        self.layers.push(cache);
        self
    }
}

#[async_trait]
impl Cache for CacheManager {
    async fn get_raw(&self, key: &str) -> Option<String> {
        for (idx, layer) in self.layers.iter().enumerate() {
            let Some(raw) = layer.get_raw(key).await else {
                continue;
            };
            for earlier in &self.layers[..idx] {
                let _ = earlier.set_raw(key, raw.clone(), Duration::from_secs(3600)).await;
            }
            return Some(raw);
        }
        None
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        for layer in &self.layers {
            layer.set_raw(key, value.clone(), ttl).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        for layer in &self.layers {
            layer.delete(key).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        for layer in &self.layers {
            layer.clear().await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        for layer in &self.layers {
            if layer.exists(key).await {
                return true;
            }
        }
        false
    }

    async fn ttl(&self, key: &str) -> Option<Duration> {
        for layer in &self.layers {
            if let Some(ttl) = layer.ttl(key).await {
                return Some(ttl);
            }
        }
        None
    }
}

/// Cache key builder for consistent key generation.
pub struct CacheKey;

impl CacheKey {
    /// `stream:movie:<baseId>` or `stream:series:<baseId>[:<season>:<episode>]`.
    pub fn stream(media_type: &str, base_id: &str, season: Option<u32>, episode: Option<u32>) -> String {
        match (season, episode) {
            (Some(s), Some(e)) => format!("stream:{media_type}:{base_id}:{s}:{e}"),
            _ => format!("stream:{media_type}:{base_id}"),
        }
    }
}
