//! Redis-backed cache store shared across processes.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::store::{CacheError, CacheStore};

pub type SharedRedis = Arc<Mutex<ConnectionManager>>;

#[derive(Clone)]
pub struct RedisCache {
    redis: SharedRedis,
}

impl RedisCache {
    pub fn new(redis: SharedRedis) -> Self {
        Self { redis }
    }

    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        debug!(target: "agora::cache", "redis connection manager ready");
        Ok(Self::new(Arc::new(Mutex::new(manager))))
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.redis.lock().await;
        let Some(raw) = conn.get::<_, Option<String>>(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(target: "agora::cache", key, error = %err, "dropping undecodable cache entry");
                let _ = conn.del::<_, ()>(key).await;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(&value)?;
        let mut conn = self.redis.lock().await;
        conn.set_ex::<_, _, ()>(key, payload, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.redis.lock().await;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
