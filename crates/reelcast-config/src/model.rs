//! Typed configuration models shared by the relay binary and pipeline.
//!
//! # Design
//! - Durations are converted once at load time; consumers never re-parse strings.
//! - `PipelineConfig::default()` mirrors the documented defaults so tests can
//!   tweak individual knobs with struct update syntax.

use std::time::Duration;

use serde::Serialize;

use crate::defaults;

/// Complete relay configuration resolved from the environment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayConfig {
    /// Bot API credentials and endpoint.
    pub telegram: TelegramConfig,
    /// Postgres connection string.
    #[serde(skip_serializing)]
    pub database_url: String,
    /// Batching, throttling, and publishing knobs.
    pub pipeline: PipelineConfig,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Explicit log format (`json` or `pretty`); inferred when absent.
    pub log_format: Option<String>,
}

/// Bot API connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelegramConfig {
    /// Bot token issued by the platform.
    #[serde(skip_serializing)]
    pub bot_token: String,
    /// API endpoint, without trailing slash.
    pub api_base: String,
}

/// Knobs governing ingestion, batching, and finalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Minimum similarity for a file to join an open batch.
    pub similarity_threshold: f64,
    /// Quiet time after the last matching file before a batch finalizes.
    pub quiet_window: Duration,
    /// How often the sweeper looks for expired batches.
    pub sweep_interval: Duration,
    /// Lifetime of a channel's "incoming" notice flag.
    pub notice_cooldown: Duration,
    /// Maximum files listed per post.
    pub files_per_post: usize,
    /// Delay between consecutive sends while finalizing.
    pub send_delay: Duration,
    /// Added to every remote-mandated cooldown.
    pub flood_buffer: Duration,
    /// Wait between polls while no archive channel is configured.
    pub archive_backoff: Duration,
    /// Capacity of the ingestion queue.
    pub queue_capacity: usize,
    /// Text of the "incoming" notice.
    pub notice_text: String,
    /// Base URL used to build per-file links, without trailing slash.
    pub public_base_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: defaults::SIMILARITY_THRESHOLD,
            quiet_window: Duration::from_secs(defaults::QUIET_WINDOW_SECS),
            sweep_interval: Duration::from_millis(defaults::SWEEP_INTERVAL_MS),
            notice_cooldown: Duration::from_secs(defaults::NOTICE_COOLDOWN_SECS),
            files_per_post: defaults::FILES_PER_POST,
            send_delay: Duration::from_millis(defaults::SEND_DELAY_MS),
            flood_buffer: Duration::from_secs(defaults::FLOOD_BUFFER_SECS),
            archive_backoff: Duration::from_secs(defaults::ARCHIVE_BACKOFF_SECS),
            queue_capacity: defaults::QUEUE_CAPACITY,
            notice_text: defaults::NOTICE_TEXT.to_string(),
            public_base_url: defaults::PUBLIC_BASE_URL.to_string(),
        }
    }
}
