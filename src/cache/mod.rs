//! Declarative caching for the storage facade.
//!
//! A policy table names the storage reads to memoize, their key arguments and
//! TTLs, and the writes that evict them. The table is validated into a
//! [`CachePlan`] at startup; [`CacheLayer`] then wraps every storage module so
//! that reads go through the cache and writes schedule evictions.
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "memory"      # or "redis"
//! memory_capacity = 10000
//! # redis_url = "redis://127.0.0.1:6379"
//! ```

pub mod catalog;
mod config;
mod decorators;
mod events;
mod keys;
mod layer;
mod lock;
pub mod plan;
pub mod policy;
mod redis_store;
mod store;

use std::sync::Arc;

use tracing::info;

pub use config::CacheConfig;
pub use events::{
    EventKind, METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATE, METRIC_CACHE_MISS,
    METRIC_CACHE_STORE,
};
pub use keys::{KeyArg, arg, cache_key};
pub use layer::CacheLayer;
pub use plan::{CachePlan, PlanError};
pub use redis_store::{RedisCache, SharedRedis};
pub use store::{CacheError, CacheStore, MemoryCache};

use crate::config::CacheBackend;

/// Validate the built-in policy table against the storage catalog.
pub fn default_plan() -> Result<CachePlan, PlanError> {
    CachePlan::build(&policy::default_table(), catalog::CATALOG)
}

/// Build the cache layer described by `config`, or `None` when caching is off.
pub async fn build(config: &CacheConfig) -> Result<Option<CacheLayer>, CacheError> {
    if !config.enabled {
        info!(target: "agora::cache", "cache layer disabled");
        return Ok(None);
    }

    let plan = default_plan()?;
    let store: Arc<dyn CacheStore> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new(config.memory_capacity_non_zero())),
        CacheBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or(CacheError::MissingRedisUrl)?;
            Arc::new(RedisCache::connect(url).await?)
        }
    };

    info!(
        target: "agora::cache",
        backend = ?config.backend,
        cached = plan.cached_len(),
        triggers = plan.trigger_len(),
        "cache layer ready"
    );
    Ok(Some(CacheLayer::new(Arc::new(plan), store)))
}
