//! Cache observability: one debug event and one counter per cache decision.

use metrics::counter;
use tracing::{debug, warn};

use super::catalog::Operation;

pub const METRIC_CACHE_HIT: &str = "agora_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "agora_cache_miss_total";
pub const METRIC_CACHE_STORE: &str = "agora_cache_store_total";
pub const METRIC_CACHE_INVALIDATE: &str = "agora_cache_invalidate_total";
pub const METRIC_CACHE_ERROR: &str = "agora_cache_error_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Hit,
    Miss,
    Store,
    Invalidate,
}

impl EventKind {
    fn metric(self) -> &'static str {
        match self {
            EventKind::Hit => METRIC_CACHE_HIT,
            EventKind::Miss => METRIC_CACHE_MISS,
            EventKind::Store => METRIC_CACHE_STORE,
            EventKind::Invalidate => METRIC_CACHE_INVALIDATE,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            EventKind::Hit => "hit",
            EventKind::Miss => "miss",
            EventKind::Store => "store",
            EventKind::Invalidate => "invalidate",
        }
    }
}

pub(crate) fn record(kind: EventKind, operation: &Operation, key: &str) {
    debug!(
        target: "agora::cache",
        event = kind.as_str(),
        module = operation.module.as_str(),
        operation = operation.name,
        key,
        "cache {}",
        kind.as_str()
    );
    counter!(
        kind.metric(),
        "module" => operation.module.as_str(),
        "operation" => operation.name
    )
    .increment(1);
}

/// A cache backend failure. Never surfaced to the caller.
pub(crate) fn record_error(
    stage: &'static str,
    operation: &Operation,
    key: &str,
    error: &dyn std::error::Error,
) {
    warn!(
        target: "agora::cache",
        stage,
        module = operation.module.as_str(),
        operation = operation.name,
        key,
        error = %error,
        "cache backend failure"
    );
    counter!(METRIC_CACHE_ERROR, "stage" => stage).increment(1);
}
