//! Cache facade over Redis with an in-process fallback.
//!
//! Every operation is infallible from the caller's point of view: when the
//! Redis backend is unreachable (at startup or per call) the facade serves
//! the bounded in-memory store instead. The cache is advisory; the
//! relational store stays the only source of truth.

use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    inserted_at: Instant,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            inserted_at: now,
            expires_at: ttl.map(|d| now + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// Bounded in-process store used when Redis is unavailable. Expired entries
/// are evicted first; past capacity the oldest entry goes.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
    capacity: usize,
}

impl InMemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let expired = {
            let store = self.store.read().unwrap();
            match store.get(key) {
                Some(entry) if entry.is_expired() => true,
                Some(entry) => return Some(entry.value.clone()),
                None => return None,
            }
        };
        if expired {
            self.store.write().unwrap().remove(key);
        }
        None
    }

    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let mut store = self.store.write().unwrap();
        if !store.contains_key(key) && store.len() >= self.capacity {
            store.retain(|_, entry| !entry.is_expired());
            if store.len() >= self.capacity {
                if let Some(oldest) = store
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(k, _)| k.clone())
                {
                    store.remove(&oldest);
                }
            }
        }
        store.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
    }

    pub fn delete(&self, key: &str) {
        self.store.write().unwrap().remove(key);
    }

    pub fn increment(&self, key: &str) -> i64 {
        let mut store = self.store.write().unwrap();
        let current = store
            .get(key)
            .filter(|entry| !entry.is_expired())
            .and_then(|entry| entry.value.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        store.insert(key.to_string(), CacheEntry::new(next.to_string(), None));
        next
    }

    pub fn len(&self) -> usize {
        self.store.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[derive(Clone)]
pub struct CacheFacade {
    backend: Option<ConnectionManager>,
    fallback: InMemoryStore,
    default_ttl: Duration,
}

impl CacheFacade {
    /// Connects to Redis; on failure the facade starts in fallback-only
    /// mode rather than erroring.
    pub async fn connect(redis_url: &str, capacity: usize, default_ttl: Duration) -> Self {
        let backend = match redis::Client::open(redis_url) {
            Ok(client) => match client.get_tokio_connection_manager().await {
                Ok(manager) => Some(manager),
                Err(e) => {
                    warn!(error = %e, "Redis unreachable, using in-memory cache fallback");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Invalid Redis URL, using in-memory cache fallback");
                None
            }
        };

        Self {
            backend,
            fallback: InMemoryStore::new(capacity),
            default_ttl,
        }
    }

    /// A facade with no external backend at all. Used by tests and
    /// deployments without Redis.
    pub fn in_memory_only(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            backend: None,
            fallback: InMemoryStore::new(capacity),
            default_ttl,
        }
    }

    pub fn is_backend_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(manager) = &self.backend {
            let mut conn = manager.clone();
            match redis::cmd("GET")
                .arg(key)
                .query_async::<_, Option<String>>(&mut conn)
                .await
            {
                Ok(value) => return value,
                Err(e) => {
                    warn!(key, error = %e, "Cache get failed, falling back to in-memory store");
                }
            }
        }
        self.fallback.get(key)
    }

    /// Stores a value. `ttl_secs` of 0 disables caching for this entry.
    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        if ttl_secs == 0 {
            debug!(key, "Cache set skipped (ttl 0)");
            return;
        }
        if let Some(manager) = &self.backend {
            let mut conn = manager.clone();
            match redis::cmd("SETEX")
                .arg(key)
                .arg(ttl_secs)
                .arg(value)
                .query_async::<_, ()>(&mut conn)
                .await
            {
                Ok(()) => return,
                Err(e) => {
                    warn!(key, error = %e, "Cache set failed, falling back to in-memory store");
                }
            }
        }
        self.fallback
            .set(key, value, Some(Duration::from_secs(ttl_secs)));
    }

    /// Best-effort delete: failures are logged and swallowed so a failed
    /// purge never aborts the calling write.
    pub async fn delete(&self, key: &str) {
        if let Some(manager) = &self.backend {
            let mut conn = manager.clone();
            if let Err(e) = redis::cmd("DEL")
                .arg(key)
                .query_async::<_, ()>(&mut conn)
                .await
            {
                warn!(key, error = %e, "Cache delete failed (ignored)");
            }
        }
        self.fallback.delete(key);
    }

    /// Increments a counter key and returns the new value. Counter keys do
    /// not expire; they back search-index versioning.
    pub async fn increment(&self, key: &str) -> i64 {
        if let Some(manager) = &self.backend {
            let mut conn = manager.clone();
            match redis::cmd("INCR")
                .arg(key)
                .query_async::<_, i64>(&mut conn)
                .await
            {
                Ok(value) => return value,
                Err(e) => {
                    warn!(key, error = %e, "Cache incr failed, falling back to in-memory store");
                }
            }
        }
        self.fallback.increment(key)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Cached payload failed to deserialize, treating as miss");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw, ttl_secs).await,
            Err(e) => warn!(key, error = %e, "Failed to serialize cache payload (skipped)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_set_get_delete() {
        let store = InMemoryStore::new(10);
        store.set("k", "v", None);
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.delete("k");
        assert!(store.get("k").is_none());
    }

    #[test]
    fn expired_entries_read_as_miss() {
        let store = InMemoryStore::new(10);
        store.set("k", "v", Some(Duration::from_millis(0)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get("k").is_none());
    }

    #[test]
    fn capacity_is_bounded() {
        let store = InMemoryStore::new(3);
        for i in 0..10 {
            store.set(&format!("k{}", i), "v", None);
        }
        assert!(store.len() <= 3);
    }

    #[test]
    fn increment_counts_from_zero() {
        let store = InMemoryStore::new(10);
        assert_eq!(store.increment("counter"), 1);
        assert_eq!(store.increment("counter"), 2);
        assert_eq!(store.increment("counter"), 3);
    }

    #[tokio::test]
    async fn facade_without_backend_serves_fallback() {
        let cache = CacheFacade::in_memory_only(10, Duration::from_secs(60));
        assert!(!cache.is_backend_available());
        cache.set("k", "v", 60).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        cache.delete("k").await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn ttl_zero_disables_store() {
        let cache = CacheFacade::in_memory_only(10, Duration::from_secs(60));
        cache.set("k", "v", 0).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn json_round_trip() {
        let cache = CacheFacade::in_memory_only(10, Duration::from_secs(60));
        cache.set_json("nums", &vec![1, 2, 3], 60).await;
        let back: Option<Vec<i32>> = cache.get_json("nums").await;
        assert_eq!(back, Some(vec![1, 2, 3]));
    }
}
