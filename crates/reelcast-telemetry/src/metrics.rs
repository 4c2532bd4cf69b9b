//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters/gauges the relay pipeline actually drives.

use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the relay.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    events_emitted_total: IntCounterVec,
    files_ingested_total: IntCounter,
    ingest_failures_total: IntCounter,
    batches_opened_total: IntCounter,
    batches_finalized_total: IntCounter,
    posts_sent_total: IntCounter,
    notices_sent_total: IntCounter,
    flood_waits_total: IntCounter,
    destination_failures_total: IntCounter,
    open_batches: IntGauge,
    queue_depth: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Files archived and routed to a batch.
    pub files_ingested_total: u64,
    /// File events that failed during ingestion.
    pub ingest_failures_total: u64,
    /// Batches opened.
    pub batches_opened_total: u64,
    /// Batches finalized.
    pub batches_finalized_total: u64,
    /// Posts delivered to destination channels.
    pub posts_sent_total: u64,
    /// "Incoming" notices delivered.
    pub notices_sent_total: u64,
    /// Remote throttling signals absorbed.
    pub flood_waits_total: u64,
    /// Destinations skipped because of permission failures.
    pub destination_failures_total: u64,
    /// Batches currently open.
    pub open_batches: i64,
    /// File events waiting in the ingestion queue.
    pub queue_depth: i64,
}

fn counter(registry: &Registry, name: &'static str, help: &str) -> Result<IntCounter> {
    let collector = IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

fn gauge(registry: &Registry, name: &'static str, help: &str) -> Result<IntGauge> {
    let collector = IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let name = "events_emitted_total";
        let events_emitted_total =
            IntCounterVec::new(Opts::new(name, "Domain events emitted by type"), &["type"])
                .map_err(|source| TelemetryError::MetricsCollector { name, source })?;
        registry
            .register(Box::new(events_emitted_total.clone()))
            .map_err(|source| TelemetryError::MetricsRegister { name, source })?;

        let files_ingested_total = counter(
            &registry,
            "files_ingested_total",
            "Files archived and routed to a batch",
        )?;
        let ingest_failures_total = counter(
            &registry,
            "ingest_failures_total",
            "File events that failed during ingestion",
        )?;
        let batches_opened_total =
            counter(&registry, "batches_opened_total", "Release batches opened")?;
        let batches_finalized_total = counter(
            &registry,
            "batches_finalized_total",
            "Release batches finalized",
        )?;
        let posts_sent_total = counter(
            &registry,
            "posts_sent_total",
            "Posts delivered to destination channels",
        )?;
        let notices_sent_total = counter(
            &registry,
            "notices_sent_total",
            "Incoming-content notices delivered",
        )?;
        let flood_waits_total = counter(
            &registry,
            "flood_waits_total",
            "Remote throttling signals absorbed by sleeping",
        )?;
        let destination_failures_total = counter(
            &registry,
            "destination_failures_total",
            "Destinations skipped after permission failures",
        )?;
        let open_batches = gauge(&registry, "open_batches", "Release batches currently open")?;
        let queue_depth = gauge(&registry, "queue_depth", "File events awaiting ingestion")?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                events_emitted_total,
                files_ingested_total,
                ingest_failures_total,
                batches_opened_total,
                batches_finalized_total,
                posts_sent_total,
                notices_sent_total,
                flood_waits_total,
                destination_failures_total,
                open_batches,
                queue_depth,
            }),
        })
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Count a file that made it through ingestion.
    pub fn inc_file_ingested(&self) {
        self.inner.files_ingested_total.inc();
    }

    /// Count a file event whose ingestion failed.
    pub fn inc_ingest_failure(&self) {
        self.inner.ingest_failures_total.inc();
    }

    /// Count a newly opened batch.
    pub fn inc_batch_opened(&self) {
        self.inner.batches_opened_total.inc();
    }

    /// Count a finalized batch.
    pub fn inc_batch_finalized(&self) {
        self.inner.batches_finalized_total.inc();
    }

    /// Count a delivered post.
    pub fn inc_post_sent(&self) {
        self.inner.posts_sent_total.inc();
    }

    /// Count a delivered notice.
    pub fn inc_notice_sent(&self) {
        self.inner.notices_sent_total.inc();
    }

    /// Count an absorbed throttling signal.
    pub fn inc_flood_wait(&self) {
        self.inner.flood_waits_total.inc();
    }

    /// Count a destination skipped after a permission failure.
    pub fn inc_destination_failure(&self) {
        self.inner.destination_failures_total.inc();
    }

    /// Set the open batch gauge.
    pub fn set_open_batches(&self, count: usize) {
        self.inner.open_batches.set(saturating_i64(count));
    }

    /// Set the queue depth gauge.
    pub fn set_queue_depth(&self, depth: usize) {
        self.inner.queue_depth.set(saturating_i64(depth));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded.
    pub fn render(&self) -> Result<String> {
        let metric_families = self.inner.registry.gather();
        let mut buffer = String::new();
        TextEncoder::new()
            .encode_utf8(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        Ok(buffer)
    }

    /// Take a point-in-time snapshot of the pipeline counters and gauges.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            files_ingested_total: inner.files_ingested_total.get(),
            ingest_failures_total: inner.ingest_failures_total.get(),
            batches_opened_total: inner.batches_opened_total.get(),
            batches_finalized_total: inner.batches_finalized_total.get(),
            posts_sent_total: inner.posts_sent_total.get(),
            notices_sent_total: inner.notices_sent_total.get(),
            flood_waits_total: inner.flood_waits_total.get(),
            destination_failures_total: inner.destination_failures_total.get(),
            open_batches: inner.open_batches.get(),
            queue_depth: inner.queue_depth.get(),
        }
    }
}

fn saturating_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_failures_carry_the_metric_name() {
        let registry = Registry::new();
        assert!(matches!(
            counter(&registry, "bad-name", "invalid metric name"),
            Err(TelemetryError::MetricsCollector { name: "bad-name", .. })
        ));

        assert!(gauge(&registry, "depth", "first registration").is_ok());
        assert!(matches!(
            gauge(&registry, "depth", "second registration"),
            Err(TelemetryError::MetricsRegister { name: "depth", .. })
        ));
    }

    #[test]
    fn saturating_i64_caps_large_values() {
        assert_eq!(saturating_i64(usize::MAX), i64::MAX);
        assert_eq!(saturating_i64(3), 3);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_event("batch_opened");
        metrics.inc_file_ingested();
        metrics.inc_file_ingested();
        metrics.inc_ingest_failure();
        metrics.inc_batch_opened();
        metrics.inc_batch_finalized();
        metrics.inc_post_sent();
        metrics.inc_notice_sent();
        metrics.inc_flood_wait();
        metrics.inc_destination_failure();
        metrics.set_open_batches(4);
        metrics.set_queue_depth(9);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_ingested_total, 2);
        assert_eq!(snapshot.ingest_failures_total, 1);
        assert_eq!(snapshot.batches_opened_total, 1);
        assert_eq!(snapshot.batches_finalized_total, 1);
        assert_eq!(snapshot.posts_sent_total, 1);
        assert_eq!(snapshot.notices_sent_total, 1);
        assert_eq!(snapshot.flood_waits_total, 1);
        assert_eq!(snapshot.destination_failures_total, 1);
        assert_eq!(snapshot.open_batches, 4);
        assert_eq!(snapshot.queue_depth, 9);

        let rendered = metrics.render()?;
        assert!(rendered.contains("events_emitted_total"));
        assert!(rendered.contains("flood_waits_total"));
        assert!(rendered.contains("open_batches 4"));
        Ok(())
    }

    #[test]
    fn clones_share_the_same_registry() -> Result<()> {
        let metrics = Metrics::new()?;
        let clone = metrics.clone();
        clone.inc_post_sent();
        assert_eq!(metrics.snapshot().posts_sent_total, 1);
        Ok(())
    }
}
