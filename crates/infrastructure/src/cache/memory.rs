use super::{Cache, CacheError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// In-memory cache backend with TTL support. Used standalone in tests and
/// as the first, fastest layer in front of `RedisCache` in production.
pub struct MemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_size: usize,
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_config(10_000, Duration::from_secs(300))
    }

    pub fn with_config(max_size: usize, cleanup_interval: Duration) -> Self {
        let cache = Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            max_size,
        };

        let store_clone = cache.store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            loop {
                interval.tick().await;
                Self::cleanup_expired(&store_clone).await;
            }
        });

        cache
    }

    async fn cleanup_expired(store: &Arc<RwLock<HashMap<String, CacheEntry>>>) {
        let mut store = store.write().await;
        let now = Instant::now();
        let before_size = store.len();

        store.retain(|_key, entry| entry.expires_at > now);

        let removed = before_size - store.len();
        if removed > 0 {
            debug!("cleaned up {} expired cache entries", removed);
        }
    }

    fn evict_if_needed(&self, store: &mut HashMap<String, CacheEntry>) {
        if store.len() >= self.max_size {
            let to_remove = store.len() - (self.max_size * 9 / 10);
            let keys_to_remove: Vec<String> = store.keys().take(to_remove).cloned().collect();
            for key in keys_to_remove {
                store.remove(&key);
            }
            debug!("evicted {} cache entries", to_remove);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_raw(&self, key: &str) -> Option<String> {
        let store = self.store.read().await;
        match store.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                trace!(key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                trace!(key, "cache entry expired");
                None
            }
            None => {
                trace!(key, "cache miss");
                None
            }
        }
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };

        let mut store = self.store.write().await;
        self.evict_if_needed(&mut store);
        store.insert(key.to_string(), entry);

        trace!(key, ?ttl, "cached value");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut store = self.store.write().await;
        store.remove(key);
        trace!(key, "deleted cache entry");
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut store = self.store.write().await;
        let count = store.len();
        store.clear();
        debug!("cleared {} cache entries", count);
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        let store = self.store.read().await;
        matches!(store.get(key), Some(entry) if entry.expires_at > Instant::now())
    }

    async fn ttl(&self, key: &str) -> Option<Duration> {
        let store = self.store.read().await;
        let entry = store.get(key)?;
        let now = Instant::now();
        (entry.expires_at > now).then(|| entry.expires_at - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheExt;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        id: i32,
        name: String,
    }

    #[tokio::test]
    async fn test_memory_cache_basic() {
        let cache = MemoryCache::new();

        let data = TestData {
            id: 1,
            name: "Test".to_string(),
        };

        cache.set("test_key", &data, Duration::from_secs(60)).await.unwrap();

        let retrieved: Option<TestData> = cache.get("test_key").await;
        assert_eq!(retrieved, Some(data.clone()));

        assert!(cache.exists("test_key").await);
        assert!(!cache.exists("non_existent").await);

        cache.delete("test_key").await.unwrap();
        let retrieved: Option<TestData> = cache.get("test_key").await;
        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    async fn test_memory_cache_expiration() {
        let cache = MemoryCache::new();

        let data = TestData {
            id: 2,
            name: "Expires".to_string(),
        };

        cache.set("expires", &data, Duration::from_millis(100)).await.unwrap();
        assert!(cache.exists("expires").await);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!cache.exists("expires").await);
        let retrieved: Option<TestData> = cache.get("expires").await;
        assert_eq!(retrieved, None);
    }
}
