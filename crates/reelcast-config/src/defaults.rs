//! Environment variable names and fallback values.
//!
//! # Design
//! - Keep every tunable name next to its default so operators can audit both at once.
//! - Durations are stored in the unit the variable is expressed in.

pub(crate) const BOT_TOKEN_VAR: &str = "REELCAST_BOT_TOKEN";
pub(crate) const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub(crate) const API_BASE_VAR: &str = "REELCAST_API_BASE";
pub(crate) const PUBLIC_BASE_URL_VAR: &str = "REELCAST_PUBLIC_BASE_URL";
pub(crate) const SIMILARITY_THRESHOLD_VAR: &str = "REELCAST_SIMILARITY_THRESHOLD";
pub(crate) const QUIET_WINDOW_VAR: &str = "REELCAST_QUIET_WINDOW_SECS";
pub(crate) const SWEEP_INTERVAL_VAR: &str = "REELCAST_SWEEP_INTERVAL_MS";
pub(crate) const NOTICE_COOLDOWN_VAR: &str = "REELCAST_NOTICE_COOLDOWN_SECS";
pub(crate) const FILES_PER_POST_VAR: &str = "REELCAST_FILES_PER_POST";
pub(crate) const SEND_DELAY_VAR: &str = "REELCAST_SEND_DELAY_MS";
pub(crate) const FLOOD_BUFFER_VAR: &str = "REELCAST_FLOOD_BUFFER_SECS";
pub(crate) const ARCHIVE_BACKOFF_VAR: &str = "REELCAST_ARCHIVE_BACKOFF_SECS";
pub(crate) const QUEUE_CAPACITY_VAR: &str = "REELCAST_QUEUE_CAPACITY";
pub(crate) const NOTICE_TEXT_VAR: &str = "REELCAST_NOTICE_TEXT";
pub(crate) const LOG_LEVEL_VAR: &str = "REELCAST_LOG_LEVEL";
pub(crate) const LOG_FORMAT_VAR: &str = "REELCAST_LOG_FORMAT";

/// Public Bot API endpoint.
pub const API_BASE: &str = "https://api.telegram.org";
/// Base URL of the redirect service that resolves `/get/{unique_id}` links.
pub const PUBLIC_BASE_URL: &str = "http://127.0.0.1:8080";
/// Minimum score for a file to join an open batch.
pub const SIMILARITY_THRESHOLD: f64 = 0.85;
/// Seconds without a matching file before a batch is finalized.
pub const QUIET_WINDOW_SECS: u64 = 7;
/// Interval between sweeps for expired batches.
pub const SWEEP_INTERVAL_MS: u64 = 1_000;
/// Seconds a channel's "incoming" notice stays active.
pub const NOTICE_COOLDOWN_SECS: u64 = 60;
/// Maximum number of files listed in one post.
pub const FILES_PER_POST: usize = 20;
/// Pause between consecutive sends during finalization.
pub const SEND_DELAY_MS: u64 = 2_000;
/// Extra seconds added to every remote-mandated cooldown.
pub const FLOOD_BUFFER_SECS: u64 = 2;
/// Wait before re-polling for an archive channel.
pub const ARCHIVE_BACKOFF_SECS: u64 = 60;
/// Bound on queued, unprocessed file events.
pub const QUEUE_CAPACITY: usize = 1_024;
/// Notice posted to destinations while a release is being prepared.
pub const NOTICE_TEXT: &str = "✨ New releases are coming...";
/// Log filter used when `RUST_LOG` is unset.
pub const LOG_LEVEL: &str = "info";
