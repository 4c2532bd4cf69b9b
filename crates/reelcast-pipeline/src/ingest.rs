//! Intake gate, bounded ingestion queue, and the single ingestion worker.
//!
//! # Design
//! - The queue is a bounded mpsc channel; producers either wait for capacity
//!   or fail fast, the worker is the only consumer.
//! - The worker handles one event at a time, so admission decisions for an
//!   owner follow arrival order. A failed event is logged and counted and the
//!   loop moves on.
//! - Throttling and archive backoff stall only the worker; producers keep
//!   enqueueing until the queue is full.

use std::sync::Arc;
use std::time::Duration;

use reelcast_config::PipelineConfig;
use reelcast_core::{
    ArchivedFile, ChannelId, ChannelPost, FileEvent, PersistenceStore, RemoteTransport,
};
use reelcast_events::{Event, EventBus};
use reelcast_telemetry::Metrics;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::aggregator::{Admission, BatchAggregator};
use crate::error::{PipelineError, PipelineResult};
use crate::normalize::normalize;
use crate::relay::{RelayDependencies, emit};
use crate::throttle::FloodGuard;

/// Producer side of the ingestion queue.
#[derive(Clone)]
pub struct IngestQueue {
    sender: mpsc::Sender<FileEvent>,
    metrics: Metrics,
}

impl IngestQueue {
    /// Create a queue holding at most `capacity` pending events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn bounded(capacity: usize, metrics: Metrics) -> (Self, mpsc::Receiver<FileEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender, metrics }, receiver)
    }

    /// Enqueue an event, waiting for free capacity.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::QueueClosed`] once the worker stopped accepting events.
    pub async fn submit(&self, event: FileEvent) -> PipelineResult<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| PipelineError::QueueClosed)?;
        self.metrics.set_queue_depth(self.depth());
        Ok(())
    }

    /// Enqueue an event without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::QueueFull`] when no capacity is free and
    /// [`PipelineError::QueueClosed`] once the worker stopped accepting events.
    pub fn try_submit(&self, event: FileEvent) -> PipelineResult<()> {
        self.sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => PipelineError::QueueFull {
                capacity: self.capacity(),
            },
            TrySendError::Closed(_) => PipelineError::QueueClosed,
        })?;
        self.metrics.set_queue_depth(self.depth());
        Ok(())
    }

    /// Events currently waiting for the worker.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Maximum number of pending events.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}

/// Turns observed channel posts into queued file events.
#[derive(Clone)]
pub struct Intake {
    store: Arc<dyn PersistenceStore>,
    queue: IngestQueue,
}

impl Intake {
    /// Gate posts through `store` ownership lookups into `queue`.
    #[must_use]
    pub fn new(store: Arc<dyn PersistenceStore>, queue: IngestQueue) -> Self {
        Self { store, queue }
    }

    /// Queue `post` when it carries a named file from a watched channel.
    ///
    /// Returns whether the post was accepted.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when the owner lookup fails and the
    /// queue errors of [`IngestQueue::submit`].
    pub async fn observe(&self, post: ChannelPost) -> PipelineResult<bool> {
        let chat = post.message.chat_id;
        let Some(media) = post.media else {
            debug!(channel_id = %chat, "ignoring post without media");
            return Ok(false);
        };
        if media.file_name.trim().is_empty() {
            debug!(channel_id = %chat, kind = media.kind.as_str(), "ignoring unnamed media");
            return Ok(false);
        }
        let owner = self
            .store
            .owner_for_watched_channel(chat)
            .await
            .map_err(|err| PipelineError::store("owner_for_watched_channel", err))?;
        let Some(owner_id) = owner else {
            debug!(channel_id = %chat, "ignoring post from unwatched channel");
            return Ok(false);
        };

        self.queue
            .submit(FileEvent {
                owner_id,
                source: post.message,
                media,
            })
            .await?;
        Ok(true)
    }
}

/// What the worker did with the events still queued at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Events handled after the shutdown signal.
    pub drained: usize,
    /// Filenames given up because no archive channel was configured.
    pub unarchived: Vec<String>,
}

/// Single consumer of the ingestion queue.
pub struct IngestWorker {
    transport: Arc<dyn RemoteTransport>,
    store: Arc<dyn PersistenceStore>,
    aggregator: Arc<BatchAggregator>,
    guard: FloodGuard,
    events: EventBus,
    metrics: Metrics,
    archive_backoff: Duration,
    shutdown: watch::Receiver<bool>,
}

impl IngestWorker {
    /// Build a worker feeding `aggregator`; it stops once `shutdown` turns `true`.
    #[must_use]
    pub fn new(
        deps: &RelayDependencies,
        aggregator: Arc<BatchAggregator>,
        config: &PipelineConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport: Arc::clone(&deps.transport),
            store: Arc::clone(&deps.store),
            aggregator,
            guard: FloodGuard::new(config.flood_buffer, deps.metrics.clone()),
            events: deps.events.clone(),
            metrics: deps.metrics.clone(),
            archive_backoff: config.archive_backoff,
            shutdown,
        }
    }

    /// Consume events until shutdown, then drain whatever is still queued.
    pub async fn run(self, mut receiver: mpsc::Receiver<FileEvent>) -> DrainSummary {
        let mut shutdown = self.shutdown.clone();
        info!("ingest worker started");
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                event = receiver.recv() => match event {
                    Some(event) => {
                        self.handle(event, &receiver).await;
                    }
                    None => break,
                },
            }
        }

        receiver.close();
        let mut summary = DrainSummary::default();
        while let Some(event) = receiver.recv().await {
            let file_name = event.raw_filename().to_string();
            if self.handle(event, &receiver).await {
                summary.unarchived.push(file_name);
            }
            summary.drained += 1;
        }
        if !summary.unarchived.is_empty() {
            warn!(
                count = summary.unarchived.len(),
                files = ?summary.unarchived,
                "queued files dropped at shutdown without an archive channel"
            );
        }
        info!(drained = summary.drained, "ingest worker stopped");
        summary
    }

    /// Returns whether the event was given up for lack of an archive channel.
    async fn handle(&self, event: FileEvent, receiver: &mpsc::Receiver<FileEvent>) -> bool {
        let owner_id = event.owner_id;
        let file_name = event.raw_filename().to_string();
        let mut unarchived = false;
        if let Err(err) = self.process(event).await {
            unarchived = matches!(err, PipelineError::ArchiveUnavailable);
            self.metrics.inc_ingest_failure();
            error!(error = %err, owner_id = %owner_id, file_name = %file_name, "failed to ingest file");
            emit(
                &self.events,
                &self.metrics,
                Event::IngestFailed {
                    owner_id,
                    file_name,
                    message: err.to_string(),
                },
            );
        }
        self.metrics.set_queue_depth(receiver.len());
        unarchived
    }

    /// Archive, record, and batch a single event.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ArchiveUnavailable`] when shutdown arrives while
    /// waiting for an archive channel, [`PipelineError::Transport`] when the copy
    /// fails, and [`PipelineError::Store`] for persistence failures.
    pub async fn process(&self, event: FileEvent) -> PipelineResult<Admission> {
        let archive = self.archive_channel().await?;
        let source = event.source;
        let archived = self
            .guard
            .run("copy_to_archive", || {
                self.transport.copy_to_archive(source, archive)
            })
            .await
            .map_err(PipelineError::transport)?;

        let file = ArchivedFile::from_event(event, archived);
        self.store
            .save_file_record(&file)
            .await
            .map_err(|err| PipelineError::store("save_file_record", err))?;
        self.metrics.inc_file_ingested();
        emit(
            &self.events,
            &self.metrics,
            Event::FileArchived {
                owner_id: file.owner_id,
                unique_id: file.media.unique_id.clone(),
                file_name: file.media.file_name.clone(),
            },
        );

        let owner_id = file.owner_id;
        let title = normalize(&file.media.file_name);
        let admission = self.aggregator.assign(owner_id, &title, file);
        match &admission {
            Admission::Opened { batch_id } => {
                self.metrics.inc_batch_opened();
                info!(owner_id = %owner_id, batch_id, title = %title.base_title, "batch opened");
                emit(
                    &self.events,
                    &self.metrics,
                    Event::BatchOpened {
                        owner_id,
                        batch_id: *batch_id,
                        title: title.base_title.clone(),
                    },
                );
            }
            Admission::Extended {
                batch_id,
                score,
                file_count,
            } => {
                debug!(owner_id = %owner_id, batch_id, score, file_count, "batch extended");
                emit(
                    &self.events,
                    &self.metrics,
                    Event::BatchExtended {
                        owner_id,
                        batch_id: *batch_id,
                        file_count: *file_count,
                    },
                );
            }
        }
        self.metrics
            .set_open_batches(self.aggregator.open_count());
        Ok(admission)
    }

    async fn archive_channel(&self) -> PipelineResult<ChannelId> {
        let mut shutdown = self.shutdown.clone();
        loop {
            let configured = self
                .store
                .archive_channel()
                .await
                .map_err(|err| PipelineError::store("archive_channel", err))?;
            if let Some(channel) = configured {
                return Ok(channel);
            }
            if *shutdown.borrow_and_update() {
                return Err(PipelineError::ArchiveUnavailable);
            }
            warn!(
                backoff_secs = self.archive_backoff.as_secs(),
                "archive channel not configured; waiting"
            );
            tokio::select! {
                () = sleep(self.archive_backoff) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Err(PipelineError::ArchiveUnavailable);
                    }
                }
            }
        }
    }
}
