//! Rate-limited execution of remote transport calls.
//!
//! # Design
//! - Throttling signals are absorbed: sleep the mandated cooldown plus a buffer,
//!   then retry the same call, indefinitely.
//! - Every other failure is returned untouched on the first occurrence.
//! - Only the calling task stalls; the guard holds no locks and shares no state
//!   beyond metrics.

use std::future::Future;
use std::time::Duration;

use reelcast_core::{TransportError, TransportResult};
use reelcast_telemetry::Metrics;
use tokio::time::sleep;
use tracing::warn;

/// Retry wrapper shared by the ingestion worker and the finalizer.
#[derive(Clone)]
pub struct FloodGuard {
    buffer: Duration,
    metrics: Metrics,
}

impl FloodGuard {
    /// Build a guard that pads every cooldown by `buffer`.
    #[must_use]
    pub const fn new(buffer: Duration, metrics: Metrics) -> Self {
        Self { buffer, metrics }
    }

    /// Invoke `call` until it returns anything other than a throttling signal.
    ///
    /// # Errors
    ///
    /// Returns the first non-throttling [`TransportError`] produced by `call`.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> TransportResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = TransportResult<T>> + Send,
        T: Send,
    {
        loop {
            match call().await {
                Err(TransportError::RateLimited { retry_after, .. }) => {
                    let wait = retry_after.saturating_add(self.buffer);
                    self.metrics.inc_flood_wait();
                    warn!(
                        operation,
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "remote transport throttled; waiting before retry"
                    );
                    sleep(wait).await;
                }
                outcome => return outcome,
            }
        }
    }
}
