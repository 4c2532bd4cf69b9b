//! Per-channel "content incoming" notice throttling.
//!
//! Each destination channel holds at most one active flag. A flag is an expiry
//! deadline rather than a timer handle, so there is nothing to cancel: a claim
//! succeeds only when no unexpired deadline exists, and expired entries are
//! pruned lazily on the next access.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reelcast_core::ChannelId;
use tokio::time::Instant;

/// Process-wide notification flags keyed by destination channel.
#[derive(Debug)]
pub struct NoticeBoard {
    cooldown: Duration,
    flags: Mutex<HashMap<ChannelId, Instant>>,
}

impl NoticeBoard {
    /// Create a board whose flags stay active for `cooldown`.
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            flags: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically claim the right to send a notice to `channel`.
    ///
    /// Returns `false` when a notice for the channel is still active.
    pub fn try_claim(&self, channel: ChannelId, now: Instant) -> bool {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        flags.retain(|_, expires_at| *expires_at > now);
        if flags.contains_key(&channel) {
            return false;
        }
        flags.insert(channel, now + self.cooldown);
        true
    }

    /// Drop a claim whose notice could not be delivered.
    pub fn release(&self, channel: ChannelId) {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        flags.remove(&channel);
    }

    /// Whether `channel` currently has an active notice.
    #[must_use]
    pub fn is_active(&self, channel: ChannelId, now: Instant) -> bool {
        let flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        flags
            .get(&channel)
            .is_some_and(|expires_at| *expires_at > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn one_claim_per_cooldown_window() {
        let board = NoticeBoard::new(Duration::from_secs(60));
        let channel = ChannelId(-100_1);
        let start = Instant::now();

        assert!(board.try_claim(channel, start));
        assert!(!board.try_claim(channel, start + Duration::from_secs(30)));
        assert!(board.is_active(channel, start + Duration::from_secs(59)));
        assert!(!board.is_active(channel, start + Duration::from_secs(60)));
        assert!(board.try_claim(channel, start + Duration::from_secs(61)));
    }

    #[tokio::test(start_paused = true)]
    async fn channels_are_independent() {
        let board = NoticeBoard::new(Duration::from_secs(60));
        let now = Instant::now();
        assert!(board.try_claim(ChannelId(1), now));
        assert!(board.try_claim(ChannelId(2), now));
        assert!(!board.try_claim(ChannelId(1), now));
    }

    #[tokio::test(start_paused = true)]
    async fn released_claims_can_be_retaken() {
        let board = NoticeBoard::new(Duration::from_secs(60));
        let now = Instant::now();
        assert!(board.try_claim(ChannelId(9), now));
        board.release(ChannelId(9));
        assert!(!board.is_active(ChannelId(9), now));
        assert!(board.try_claim(ChannelId(9), now));
    }
}
