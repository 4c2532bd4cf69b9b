//! Long-polling source of channel posts.
//!
//! # Design
//! - Only `channel_post` updates are requested; everything else is filtered
//!   server-side.
//! - The offset advances past every update received, including posts without
//!   media, so nothing is redelivered after a restart of the loop.

use std::time::Duration;

use reelcast_core::{ChannelPost, TransportResult};
use tracing::debug;

use crate::client::BotApi;

/// Default server-side wait for `getUpdates`.
pub const DEFAULT_LONG_POLL: Duration = Duration::from_secs(25);

/// Stateful `getUpdates` cursor.
#[derive(Debug, Clone)]
pub struct UpdatePoller {
    api: BotApi,
    offset: i64,
    long_poll: Duration,
}

impl UpdatePoller {
    /// Poll through `api`, waiting up to `long_poll` for new updates.
    #[must_use]
    pub const fn new(api: BotApi, long_poll: Duration) -> Self {
        Self {
            api,
            offset: 0,
            long_poll,
        }
    }

    /// Offset that will be sent with the next request.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        self.offset
    }

    /// Fetch the next page of channel posts.
    ///
    /// # Errors
    ///
    /// Propagates the transport failure; the offset is left untouched so the
    /// same page is requested again.
    pub async fn next_posts(&mut self) -> TransportResult<Vec<ChannelPost>> {
        let updates = self.api.get_updates(self.offset, self.long_poll).await?;
        let mut posts = Vec::with_capacity(updates.len());
        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            if let Some(message) = update.channel_post {
                posts.push(message.into_post());
            }
        }
        if !posts.is_empty() {
            debug!(count = posts.len(), offset = self.offset, "received channel posts");
        }
        Ok(posts)
    }
}
