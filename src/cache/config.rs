//! Cache configuration.
//!
//! Selects the cache backend via the `[cache]` table of `agora.toml`.

use std::num::NonZeroUsize;

use crate::config::{CacheBackend, CacheSettings};

const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Wrap storage modules with the cache layer.
    pub enabled: bool,
    pub backend: CacheBackend,
    /// Maximum entries held by the in-process backend.
    pub memory_capacity: usize,
    /// Connection URL, required by the redis backend.
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            redis_url: None,
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend,
            memory_capacity: settings.memory_capacity,
            redis_url: settings.redis_url.clone(),
        }
    }
}

impl CacheConfig {
    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
