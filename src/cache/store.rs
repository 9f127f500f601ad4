//! Cache storage backends.

use std::{num::NonZeroUsize, sync::RwLock, time::Duration};

use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Plan(#[from] super::plan::PlanError),
    #[error("redis cache backend selected without a `redis_url`")]
    MissingRedisUrl,
}

/// Key/value store holding JSON-encoded storage results.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Bounded in-process LRU with per-entry expiry.
pub struct MemoryCache {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        rw_read(&self.entries, SOURCE, "contains")
            .peek(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        rw_write(&self.entries, SOURCE, "set").put(key.to_string(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "invalidate").pop(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde_json::json;

    use super::*;

    fn cache(capacity: usize) -> MemoryCache {
        MemoryCache::new(NonZeroUsize::new(capacity).expect("non-zero"))
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let store = cache(8);
        store
            .set("feed.byId.\"a\"", json!({"name": "rust"}), Duration::from_secs(30))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(
            store.get("feed.byId.\"a\"").await.expect("get"),
            Some(json!({"name": "rust"}))
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("feed.byId.\"a\"").await.expect("get"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn least_recently_used_entries_are_evicted() {
        let store = cache(2);
        let ttl = Duration::from_secs(60);
        store.set("a", json!(1), ttl).await.expect("set a");
        store.set("b", json!(2), ttl).await.expect("set b");
        store.get("a").await.expect("touch a");
        store.set("c", json!(3), ttl).await.expect("set c");

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
    }

    #[tokio::test]
    async fn invalidate_removes_the_entry() {
        let store = cache(2);
        store
            .set("a", json!(1), Duration::from_secs(60))
            .await
            .expect("set");
        store.invalidate("a").await.expect("invalidate");
        assert_eq!(store.get("a").await.expect("get"), None);
    }

    #[tokio::test]
    async fn store_recovers_from_poisoned_lock() {
        let store = cache(2);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.entries.write().expect("lock should be acquired");
            panic!("poison the cache lock");
        }));

        store
            .set("a", json!(1), Duration::from_secs(60))
            .await
            .expect("set after poison");
        assert!(store.contains("a"));
    }
}
