//! Background task wiring for the relay pipeline.
//!
//! # Design
//! - Exactly one ingestion worker and one sweeper run per [`Relay`].
//! - The sweeper polls the aggregator every `sweep_interval` and spawns one
//!   finalize task per expired batch, so finalize latency is at most one
//!   interval past the quiet window.
//! - Shutdown is ordered: the worker drains the queue first, then the sweeper
//!   finalizes every batch still open and waits for in-flight finalizes. Join
//!   errors are reported only after both tasks have stopped.

use std::sync::Arc;
use std::time::Duration;

use reelcast_config::PipelineConfig;
use reelcast_core::{PersistenceStore, PostComposer, RemoteTransport};
use reelcast_events::{Event, EventBus};
use reelcast_telemetry::Metrics;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{error, info};

use crate::aggregator::{BatchAggregator, OpenBatch};
use crate::error::{PipelineError, PipelineResult};
use crate::finalizer::BatchFinalizer;
use crate::ingest::{DrainSummary, IngestQueue, IngestWorker, Intake};

/// Collaborators shared by every pipeline component.
#[derive(Clone)]
pub struct RelayDependencies {
    /// Outbound messaging.
    pub transport: Arc<dyn RemoteTransport>,
    /// Owner settings and file records.
    pub store: Arc<dyn PersistenceStore>,
    /// Draft builder for finalized batches.
    pub composer: Arc<dyn PostComposer>,
    /// Domain event sink.
    pub events: EventBus,
    /// Prometheus collectors.
    pub metrics: Metrics,
}

/// Publish `event` and count it by kind.
pub(crate) fn emit(events: &EventBus, metrics: &Metrics, event: Event) {
    metrics.inc_event(event.kind());
    events.publish(event);
}

/// Running pipeline: intake handle plus its background tasks.
pub struct Relay {
    queue: IngestQueue,
    intake: Intake,
    aggregator: Arc<BatchAggregator>,
    finalizer: Arc<BatchFinalizer>,
    stop_worker: watch::Sender<bool>,
    stop_sweeper: watch::Sender<bool>,
    worker: JoinHandle<DrainSummary>,
    sweeper: JoinHandle<()>,
}

impl Relay {
    /// Spawn the ingestion worker and the sweeper on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn spawn(config: &PipelineConfig, deps: RelayDependencies) -> Self {
        let aggregator = Arc::new(BatchAggregator::new(
            config.similarity_threshold,
            config.quiet_window,
        ));
        let finalizer = Arc::new(BatchFinalizer::new(&deps, Arc::clone(&aggregator), config));
        let (queue, receiver) = IngestQueue::bounded(config.queue_capacity, deps.metrics.clone());
        let intake = Intake::new(Arc::clone(&deps.store), queue.clone());

        let (stop_worker, worker_signal) = watch::channel(false);
        let worker = IngestWorker::new(&deps, Arc::clone(&aggregator), config, worker_signal);
        let worker = tokio::spawn(worker.run(receiver));

        let (stop_sweeper, sweeper_signal) = watch::channel(false);
        let sweeper = Sweeper {
            aggregator: Arc::clone(&aggregator),
            finalizer: Arc::clone(&finalizer),
            interval: config.sweep_interval,
        };
        let sweeper = tokio::spawn(sweeper.run(sweeper_signal));

        info!(
            quiet_window_secs = config.quiet_window.as_secs(),
            threshold = config.similarity_threshold,
            queue_capacity = config.queue_capacity,
            "relay pipeline started"
        );
        Self {
            queue,
            intake,
            aggregator,
            finalizer,
            stop_worker,
            stop_sweeper,
            worker,
            sweeper,
        }
    }

    /// Producer handle for already-resolved file events.
    #[must_use]
    pub const fn queue(&self) -> &IngestQueue {
        &self.queue
    }

    /// Gate for raw channel posts.
    #[must_use]
    pub const fn intake(&self) -> &Intake {
        &self.intake
    }

    /// Open batch state.
    #[must_use]
    pub const fn aggregator(&self) -> &Arc<BatchAggregator> {
        &self.aggregator
    }

    /// Finalizer used by the sweeper.
    #[must_use]
    pub const fn finalizer(&self) -> &Arc<BatchFinalizer> {
        &self.finalizer
    }

    /// Stop accepting events, drain the queue, and publish every open batch.
    ///
    /// The sweeper is always stopped and joined, even when the worker panicked,
    /// so batches opened before the panic still get published.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TaskJoin`] when a background task panicked,
    /// reporting the worker ahead of the sweeper.
    pub async fn shutdown(self) -> PipelineResult<DrainSummary> {
        info!("relay pipeline shutting down");
        self.stop_worker.send_replace(true);
        let drained = self.worker.await;
        self.stop_sweeper.send_replace(true);
        let swept = self.sweeper.await;

        let summary = drained.map_err(|source| join_error("ingest_worker", source))?;
        swept.map_err(|source| join_error("sweeper", source))?;
        info!(drained = summary.drained, "relay pipeline stopped");
        Ok(summary)
    }
}

const fn join_error(task: &'static str, source: JoinError) -> PipelineError {
    PipelineError::TaskJoin { task, source }
}

struct Sweeper {
    aggregator: Arc<BatchAggregator>,
    finalizer: Arc<BatchFinalizer>,
    interval: Duration,
}

impl Sweeper {
    async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for batch in self.aggregator.take_expired(Instant::now()) {
                        self.spawn_finalize(&mut tasks, batch);
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        let remaining = self.aggregator.drain_all();
        info!(batches = remaining.len(), "finalizing open batches before exit");
        for batch in remaining {
            self.spawn_finalize(&mut tasks, batch);
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
    }

    fn spawn_finalize(&self, tasks: &mut JoinSet<()>, batch: OpenBatch) {
        let finalizer = Arc::clone(&self.finalizer);
        tasks.spawn(async move {
            let owner_id = batch.owner_id;
            let batch_id = batch.id;
            if let Err(err) = finalizer.finalize(batch).await {
                error!(error = %err, owner_id = %owner_id, batch_id, "batch finalize failed");
            }
        });
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "finalize task panicked");
    }
}
