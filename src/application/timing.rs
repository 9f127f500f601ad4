use std::{future::Future, time::Instant};

use metrics::histogram;
use tracing::debug;

pub const METRIC_SERVICE_DURATION_MS: &str = "agora_service_duration_ms";

/// Await a service call and report how long it took.
pub async fn timed<T, E, Fut>(operation: &'static str, call: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let started_at = Instant::now();
    let result = call.await;
    let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;

    histogram!(METRIC_SERVICE_DURATION_MS, "operation" => operation).record(elapsed_ms);
    debug!(
        target: "agora::performance",
        operation,
        elapsed_ms,
        ok = result.is_ok(),
        "service call finished"
    );

    result
}
