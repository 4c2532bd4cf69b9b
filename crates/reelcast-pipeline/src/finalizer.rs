//! Publishing of batches whose quiet window has elapsed.
//!
//! # Design
//! - A batch is finalized only by whoever removed it from the aggregator, so a
//!   finalize never races another finalize of the same batch.
//! - "Content incoming" notices are claimed on the shared [`NoticeBoard`] before
//!   sending; a claim whose notice fails is released again.
//! - Permission failures are per destination: the channel is skipped for the
//!   rest of the batch and the owner hears about it once. Any other transport
//!   failure aborts the remaining sends.
//! - Notice messages are deleted after the send loop whether or not it failed.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use reelcast_config::PipelineConfig;
use reelcast_core::{
    ChannelId, MessageRef, OwnerId, PersistenceStore, PostComposer, PostDraft, RemoteTransport,
    TransportError, TransportResult,
};
use reelcast_events::{BatchId, Event, EventBus};
use reelcast_telemetry::Metrics;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::aggregator::{BatchAggregator, OpenBatch};
use crate::error::{PipelineError, PipelineResult};
use crate::notice::NoticeBoard;
use crate::relay::{RelayDependencies, emit};
use crate::throttle::FloodGuard;

/// Outcome of a single finalize run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Finalized batch.
    pub batch_id: BatchId,
    /// Owner of the batch.
    pub owner_id: OwnerId,
    /// Number of files in the batch.
    pub file_count: usize,
    /// Number of drafts composed for the batch.
    pub posts: usize,
    /// Successful post sends across all destinations.
    pub delivered: usize,
    /// Notices sent before publishing.
    pub notices: usize,
    /// Destinations skipped because the relay lacks permission.
    pub skipped_channels: Vec<ChannelId>,
}

impl FinalizeReport {
    const fn empty(batch: &OpenBatch) -> Self {
        Self {
            batch_id: batch.id,
            owner_id: batch.owner_id,
            file_count: batch.files.len(),
            posts: 0,
            delivered: 0,
            notices: 0,
            skipped_channels: Vec::new(),
        }
    }
}

/// Sends finalized batches to the owner's destination channels.
pub struct BatchFinalizer {
    transport: Arc<dyn RemoteTransport>,
    store: Arc<dyn PersistenceStore>,
    composer: Arc<dyn PostComposer>,
    aggregator: Arc<BatchAggregator>,
    notices: Arc<NoticeBoard>,
    guard: FloodGuard,
    events: EventBus,
    metrics: Metrics,
    notice_text: String,
    send_delay: Duration,
}

impl BatchFinalizer {
    /// Build a finalizer publishing batches taken from `aggregator`.
    #[must_use]
    pub fn new(
        deps: &RelayDependencies,
        aggregator: Arc<BatchAggregator>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            transport: Arc::clone(&deps.transport),
            store: Arc::clone(&deps.store),
            composer: Arc::clone(&deps.composer),
            aggregator,
            notices: Arc::new(NoticeBoard::new(config.notice_cooldown)),
            guard: FloodGuard::new(config.flood_buffer, deps.metrics.clone()),
            events: deps.events.clone(),
            metrics: deps.metrics.clone(),
            notice_text: config.notice_text.clone(),
            send_delay: config.send_delay,
        }
    }

    /// Shared notice flags.
    #[must_use]
    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Take the batch out of the aggregator and publish it.
    ///
    /// Returns `Ok(None)` when the batch was already taken by someone else.
    ///
    /// # Errors
    ///
    /// See [`finalize`](Self::finalize).
    pub async fn finalize_batch(
        &self,
        owner: OwnerId,
        batch_id: BatchId,
    ) -> PipelineResult<Option<FinalizeReport>> {
        let Some(batch) = self.aggregator.take(owner, batch_id) else {
            debug!(owner_id = %owner, batch_id, "batch already finalized");
            return Ok(None);
        };
        self.finalize(batch).await.map(Some)
    }

    /// Publish a batch that the caller already removed from the aggregator.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when destinations cannot be resolved,
    /// [`PipelineError::Compose`] when drafts cannot be built, and
    /// [`PipelineError::Transport`] for a non-permission send failure.
    pub async fn finalize(&self, batch: OpenBatch) -> PipelineResult<FinalizeReport> {
        self.metrics.set_open_batches(self.aggregator.open_count());
        let mut report = FinalizeReport::empty(&batch);
        if batch.files.is_empty() {
            return Ok(report);
        }

        let channels = self
            .store
            .destination_channels(batch.owner_id)
            .await
            .map_err(|err| PipelineError::store("destination_channels", err))?;
        if channels.is_empty() {
            info!(
                owner_id = %batch.owner_id,
                batch_id = batch.id,
                files = batch.files.len(),
                "owner has no destination channels; dropping batch"
            );
            return Ok(report);
        }

        let mut rejected = BTreeSet::new();
        let notices = self.send_notices(&batch, &channels, &mut rejected).await;
        report.notices = notices.len();

        let outcome = self
            .publish(&batch, &channels, &mut rejected, &mut report)
            .await;
        self.delete_notices(&notices).await;
        outcome?;

        report.skipped_channels = rejected.into_iter().collect();
        self.metrics.inc_batch_finalized();
        emit(
            &self.events,
            &self.metrics,
            Event::BatchFinalized {
                owner_id: batch.owner_id,
                batch_id: batch.id,
                file_count: batch.files.len(),
                posts: report.posts,
            },
        );
        info!(
            owner_id = %batch.owner_id,
            batch_id = batch.id,
            title = %batch.title,
            files = report.file_count,
            posts = report.posts,
            delivered = report.delivered,
            "batch finalized"
        );
        Ok(report)
    }

    async fn send_notices(
        &self,
        batch: &OpenBatch,
        channels: &[ChannelId],
        rejected: &mut BTreeSet<ChannelId>,
    ) -> Vec<MessageRef> {
        let mut sent = Vec::new();
        for &channel in channels {
            if !self.notices.try_claim(channel, Instant::now()) {
                continue;
            }
            let outcome = self
                .guard
                .run("send_notice", || {
                    self.transport.send_text(channel, &self.notice_text, &[])
                })
                .await;
            match outcome {
                Ok(message) => {
                    self.metrics.inc_notice_sent();
                    emit(
                        &self.events,
                        &self.metrics,
                        Event::NoticeSent {
                            channel_id: channel,
                        },
                    );
                    sent.push(message);
                }
                Err(TransportError::PermissionDenied { detail, .. }) => {
                    self.notices.release(channel);
                    self.reject(batch.owner_id, channel, detail, rejected).await;
                }
                Err(err) => {
                    self.notices.release(channel);
                    warn!(error = %err, channel_id = %channel, "failed to send incoming notice");
                }
            }
        }
        sent
    }

    async fn publish(
        &self,
        batch: &OpenBatch,
        channels: &[ChannelId],
        rejected: &mut BTreeSet<ChannelId>,
        report: &mut FinalizeReport,
    ) -> PipelineResult<()> {
        let drafts = self
            .composer
            .compose_posts(batch.owner_id, &batch.files)
            .await
            .map_err(PipelineError::compose)?;
        report.posts = drafts.len();
        let parts = drafts.len();

        let mut first_send = true;
        for (index, draft) in drafts.iter().enumerate() {
            for &channel in channels {
                if rejected.contains(&channel) {
                    continue;
                }
                if !first_send {
                    sleep(self.send_delay).await;
                }
                first_send = false;

                match self.send_draft(channel, draft).await {
                    Ok(_) => {
                        report.delivered += 1;
                        self.metrics.inc_post_sent();
                        emit(
                            &self.events,
                            &self.metrics,
                            Event::PostPublished {
                                owner_id: batch.owner_id,
                                batch_id: batch.id,
                                channel_id: channel,
                                part: index + 1,
                                parts,
                            },
                        );
                    }
                    Err(TransportError::PermissionDenied { detail, .. }) => {
                        self.reject(batch.owner_id, channel, detail, rejected).await;
                    }
                    Err(err) => return Err(PipelineError::transport(err)),
                }
            }
        }
        Ok(())
    }

    async fn send_draft(&self, channel: ChannelId, draft: &PostDraft) -> TransportResult<MessageRef> {
        match &draft.poster_url {
            Some(image_url) => {
                self.guard
                    .run("send_image", || {
                        self.transport
                            .send_image(channel, image_url, &draft.caption, &draft.footer)
                    })
                    .await
            }
            None => {
                self.guard
                    .run("send_text", || {
                        self.transport
                            .send_text(channel, &draft.caption, &draft.footer)
                    })
                    .await
            }
        }
    }

    async fn reject(
        &self,
        owner: OwnerId,
        channel: ChannelId,
        detail: String,
        rejected: &mut BTreeSet<ChannelId>,
    ) {
        if !rejected.insert(channel) {
            return;
        }
        warn!(owner_id = %owner, channel_id = %channel, detail = %detail, "destination rejected post");
        self.metrics.inc_destination_failure();
        emit(
            &self.events,
            &self.metrics,
            Event::DestinationRejected {
                owner_id: owner,
                channel_id: channel,
                detail,
            },
        );

        let text = permission_notice(channel);
        let outcome = self
            .guard
            .run("notify_owner", || {
                self.transport.send_text(owner.direct_chat(), &text, &[])
            })
            .await;
        if let Err(err) = outcome {
            warn!(error = %err, owner_id = %owner, "failed to notify owner about rejected destination");
        }
    }

    async fn delete_notices(&self, notices: &[MessageRef]) {
        for &message in notices {
            let outcome = self
                .guard
                .run("delete_message", || self.transport.delete_message(message))
                .await;
            if let Err(err) = outcome {
                warn!(
                    error = %err,
                    channel_id = %message.chat_id,
                    message_id = message.message_id,
                    "failed to delete incoming notice"
                );
            }
        }
    }
}

fn permission_notice(channel: ChannelId) -> String {
    format!(
        "⚠️ Action Required!\n\nI could not post to channel `{channel}`. \
         Make sure I am an admin there with permission to post messages."
    )
}
