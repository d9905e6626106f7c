//! Caching layer for market data to reduce API calls

use cached::{Cached, TimedCache};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::StockConfig;

/// Cache key for market data requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Ticker, or a fixed tag for ticker-less requests
    pub symbol: String,
    /// API endpoint or operation type
    pub endpoint: String,
    /// Additional parameters as JSON string
    pub params: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(symbol: impl Into<String>, endpoint: impl Into<String>, params: impl Serialize) -> Self {
        Self {
            symbol: symbol.into(),
            endpoint: endpoint.into(),
            params: serde_json::to_string(&params).unwrap_or_default(),
        }
    }
}

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Thread-safe TTL cache with one in-flight fetch per key
pub struct StockCache {
    cache: Arc<RwLock<TimedCache<CacheKey, serde_json::Value>>>,
    inflight: Arc<Mutex<HashMap<CacheKey, Gate>>>,
}

impl StockCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    /// Insert a value into the cache
    pub async fn insert(&self, key: CacheKey, value: serde_json::Value) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    fn gate(&self, key: &CacheKey) -> Gate {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(inflight.entry(key.clone()).or_default())
    }

    fn release(&self, key: &CacheKey, gate: &Gate) {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        // Map entry plus our own handle: nobody else is waiting on this key.
        if Arc::strong_count(gate) <= 2 {
            inflight.remove(key);
        }
    }

    /// Get or fetch a value using the provided fetcher function
    ///
    /// If the value exists in cache, it's returned immediately. Concurrent
    /// callers asking for the same key wait for the first fetch instead of
    /// issuing their own; failures are not cached.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: CacheKey,
        fetcher: F,
    ) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<serde_json::Value, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!("Cache hit for key: {:?}", key);
            return Ok(value);
        }

        let gate = self.gate(&key);
        let result = {
            let _guard = gate.lock().await;

            if let Some(value) = self.get(&key).await {
                tracing::debug!("Cache filled while waiting for key: {:?}", key);
                Ok(value)
            } else {
                tracing::debug!("Cache miss for key: {:?}", key);
                let fetched = fetcher().await;
                if let Ok(value) = &fetched {
                    self.insert(key.clone(), value.clone()).await;
                }
                fetched
            }
        };

        self.release(&key, &gate);
        result
    }

    /// Drop one entry so the next lookup goes to the provider
    pub async fn invalidate(&self, key: &CacheKey) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(key);
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for StockCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            inflight: Arc::clone(&self.inflight),
        }
    }
}

/// One cache per data kind, each with its own freshness window
#[derive(Clone)]
pub struct CacheManager {
    /// Analysis snapshots, minutes
    pub analysis: StockCache,
    /// Price histories, about a day
    pub history: StockCache,
    /// Instrument universe, about an hour
    pub universe: StockCache,
}

impl CacheManager {
    /// Create a new cache manager with specified TTLs
    pub fn new(analysis_ttl: Duration, history_ttl: Duration, universe_ttl: Duration) -> Self {
        Self {
            analysis: StockCache::new(analysis_ttl),
            history: StockCache::new(history_ttl),
            universe: StockCache::new(universe_ttl),
        }
    }

    /// Create a cache manager using the TTLs of a configuration
    pub fn from_config(config: &StockConfig) -> Self {
        Self::new(
            config.cache_ttl_analysis,
            config.cache_ttl_history,
            config.cache_ttl_universe,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_cache_key_creation() {
        let key = CacheKey::new("NDA-FI.HE", "history", serde_json::json!({"range": "3mo"}));
        assert_eq!(key.symbol, "NDA-FI.HE");
        assert_eq!(key.endpoint, "history");
        assert!(key.params.contains("3mo"));
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::new("NOKIA", "analysis", serde_json::json!({}));
        let value = serde_json::json!({"price": 3.7});

        cache.insert(key.clone(), value.clone()).await;

        let retrieved = cache.get(&key).await;
        assert_eq!(retrieved, Some(value));
    }

    #[tokio::test]
    async fn test_cache_get_or_fetch() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::new("NOKIA", "analysis", serde_json::json!({}));
        let value = serde_json::json!({"price": 3.7});

        let mut call_count = 0;
        let fetcher = || {
            call_count += 1;
            async { Ok::<_, String>(value.clone()) }
        };

        let result = cache.get_or_fetch(key.clone(), fetcher).await.unwrap();
        assert_eq!(result, value);
        assert_eq!(call_count, 1);

        let result = cache
            .get_or_fetch(key.clone(), || async {
                call_count += 1;
                Ok::<_, String>(value.clone())
            })
            .await
            .unwrap();
        assert_eq!(result, value);
        assert_eq!(call_count, 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::new("NOKIA", "analysis", serde_json::json!({}));

        let failed = cache
            .get_or_fetch(key.clone(), || async { Err::<serde_json::Value, _>("boom") })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty().await);

        let ok = cache
            .get_or_fetch(key, || async { Ok::<_, &str>(serde_json::json!(1)) })
            .await;
        assert_eq!(ok.unwrap(), serde_json::json!(1));
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_fetch_once() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::new("NDA", "history", serde_json::json!({"range": "6mo"}));
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |cache: StockCache, key: CacheKey, calls: Arc<AtomicUsize>| async move {
            cache
                .get_or_fetch(key, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, String>(serde_json::json!([1, 2, 3]))
                })
                .await
        };

        let (a, b, c) = tokio::join!(
            fetch(cache.clone(), key.clone(), Arc::clone(&calls)),
            fetch(cache.clone(), key.clone(), Arc::clone(&calls)),
            fetch(cache.clone(), key.clone(), Arc::clone(&calls)),
        );

        assert_eq!(a.unwrap(), serde_json::json!([1, 2, 3]));
        assert!(b.is_ok() && c.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_invalidation() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::new("NOKIA", "analysis", serde_json::json!({}));

        cache.insert(key.clone(), serde_json::json!({"price": 3.7})).await;
        assert!(cache.get(&key).await.is_some());

        cache.invalidate(&key).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_manager_keeps_kinds_apart() {
        let manager = CacheManager::from_config(&StockConfig::default());

        let key = CacheKey::new("NOKIA", "analysis", serde_json::json!({}));
        let value = serde_json::json!({"price": 3.7});

        manager.analysis.insert(key.clone(), value.clone()).await;
        manager.history.insert(key.clone(), value.clone()).await;

        assert_eq!(manager.analysis.len().await, 1);
        assert_eq!(manager.history.len().await, 1);
        assert!(manager.universe.is_empty().await);

        manager.analysis.invalidate(&key).await;
        assert!(manager.analysis.is_empty().await);
        assert_eq!(manager.history.get(&key).await, Some(value));
    }
}
