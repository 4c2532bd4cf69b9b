//! Bridges long-polled channel posts into the relay intake.
//!
//! # Design
//! - The loop owns the poll cursor; a stop signal cancels an in-flight poll,
//!   which is safe because the cursor only advances on success.
//! - Poll failures never end the loop: throttling waits out `retry_after`,
//!   anything else waits a fixed backoff.

use std::time::Duration;

use async_trait::async_trait;
use reelcast_botapi::UpdatePoller;
use reelcast_core::{ChannelPost, TransportResult};
use reelcast_pipeline::Intake;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

/// Backoff after a failed poll that carried no explicit cooldown.
pub const POLL_RETRY: Duration = Duration::from_secs(5);

/// Source of raw channel posts.
#[async_trait]
pub trait PostSource: Send {
    /// Wait for the next page of posts.
    async fn next_posts(&mut self) -> TransportResult<Vec<ChannelPost>>;
}

#[async_trait]
impl PostSource for UpdatePoller {
    async fn next_posts(&mut self) -> TransportResult<Vec<ChannelPost>> {
        Self::next_posts(self).await
    }
}

/// Feed posts from `source` into `intake` until `stop` flips to `true`.
///
/// Returns how many posts the intake accepted.
pub async fn run_polling<S: PostSource>(
    mut source: S,
    intake: Intake,
    mut stop: watch::Receiver<bool>,
    retry: Duration,
) -> usize {
    let mut accepted = 0;
    while !*stop.borrow_and_update() {
        let page = tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            page = source.next_posts() => page,
        };

        match page {
            Ok(posts) => {
                for post in posts {
                    let message = post.message;
                    match intake.observe(post).await {
                        Ok(true) => accepted += 1,
                        Ok(false) => {}
                        Err(err) => warn!(
                            error = %err,
                            channel_id = %message.chat_id,
                            message_id = message.message_id,
                            "channel post dropped"
                        ),
                    }
                }
            }
            Err(err) => {
                let wait = err.retry_after().unwrap_or(retry);
                warn!(error = %err, wait_secs = wait.as_secs(), "update poll failed");
                tokio::select! {
                    () = sleep(wait) => {}
                    changed = stop.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    info!(accepted, "channel polling stopped");
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use reelcast_core::{MessageRef, TransportError};
    use reelcast_pipeline::IngestQueue;
    use reelcast_telemetry::Metrics;
    use reelcast_test_support::mocks::{MemoryStore, SOURCE_CHANNEL, file_event};
    use tokio::time::Instant;

    struct ScriptedSource {
        pages: VecDeque<TransportResult<Vec<ChannelPost>>>,
    }

    #[async_trait]
    impl PostSource for ScriptedSource {
        async fn next_posts(&mut self) -> TransportResult<Vec<ChannelPost>> {
            match self.pages.pop_front() {
                Some(page) => page,
                None => std::future::pending().await,
            }
        }
    }

    fn post(message_id: i64, name: &str) -> ChannelPost {
        ChannelPost {
            message: MessageRef::new(SOURCE_CHANNEL, message_id),
            media: Some(file_event(1, message_id, name).media),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_polls_wait_then_forward_posts() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.watch(SOURCE_CHANNEL, reelcast_core::OwnerId(1));
        let (queue, mut receiver) = IngestQueue::bounded(8, Metrics::new()?);
        let intake = Intake::new(Arc::new(store), queue);

        let source = ScriptedSource {
            pages: VecDeque::from([
                Err(TransportError::RateLimited {
                    operation: "get_updates",
                    retry_after: Duration::from_secs(3),
                }),
                Ok(vec![
                    post(1, "Alpha.S01E01.mkv"),
                    ChannelPost {
                        message: MessageRef::new(SOURCE_CHANNEL, 2),
                        media: None,
                    },
                ]),
            ]),
        };
        let (stop, signal) = watch::channel(false);
        let started = Instant::now();
        let task = tokio::spawn(run_polling(source, intake, signal, POLL_RETRY));

        let event = receiver.recv().await.expect("event forwarded");
        assert_eq!(event.source, MessageRef::new(SOURCE_CHANNEL, 1));
        assert!(started.elapsed() >= Duration::from_secs(3));

        stop.send_replace(true);
        assert_eq!(task.await?, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_pending_poll() -> anyhow::Result<()> {
        let (queue, _receiver) = IngestQueue::bounded(8, Metrics::new()?);
        let intake = Intake::new(Arc::new(MemoryStore::new()), queue);
        let source = ScriptedSource {
            pages: VecDeque::new(),
        };
        let (stop, signal) = watch::channel(false);
        let task = tokio::spawn(run_polling(source, intake, signal, POLL_RETRY));

        sleep(Duration::from_secs(60)).await;
        stop.send_replace(true);
        assert_eq!(task.await?, 0);
        Ok(())
    }
}
