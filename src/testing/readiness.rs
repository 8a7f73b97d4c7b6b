//! Readiness probe
//!
//! Polls `/status` until it answers 200 or the attempt budget runs out.

use std::time::Duration;

use tokio::time::sleep;

use crate::common::config::ReadinessConfig;
use crate::http::{ApiRequest, Transport};

use super::routes;

/// Returns true on the first 200 from `/status`
///
/// Issues at most `readiness.attempts` requests, each bounded by
/// `probe_timeout`, and sleeps `readiness.delay_ms` between them.
pub async fn wait_ready<T>(transport: &T, readiness: &ReadinessConfig, probe_timeout: Duration) -> bool
where
    T: Transport + ?Sized,
{
    for attempt in 1..=readiness.attempts {
        let result = transport
            .send(ApiRequest::get(routes::STATUS).timeout(probe_timeout))
            .await;
        if result.status == 200 {
            tracing::info!(attempt, base = transport.base_url(), "server ready");
            return true;
        }

        tracing::debug!(attempt, status = result.status, "server not ready yet");
        if attempt < readiness.attempts {
            sleep(readiness.delay()).await;
        }
    }

    tracing::warn!(
        attempts = readiness.attempts,
        "server not reachable at {}{}",
        transport.base_url(),
        routes::STATUS
    );
    false
}
