//! Environment-backed configuration loader.
//!
//! # Design
//! - `load_with` takes a lookup closure so tests never touch process state.
//! - Unset optional variables fall back to `defaults.rs`; set-but-invalid
//!   values always fail rather than silently defaulting.

use std::time::Duration;

use tracing::debug;

use crate::defaults::{
    self, API_BASE_VAR, ARCHIVE_BACKOFF_VAR, BOT_TOKEN_VAR, DATABASE_URL_VAR, FILES_PER_POST_VAR,
    FLOOD_BUFFER_VAR, LOG_FORMAT_VAR, LOG_LEVEL_VAR, NOTICE_COOLDOWN_VAR, NOTICE_TEXT_VAR,
    PUBLIC_BASE_URL_VAR, QUEUE_CAPACITY_VAR, QUIET_WINDOW_VAR, SEND_DELAY_VAR,
    SIMILARITY_THRESHOLD_VAR, SWEEP_INTERVAL_VAR,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{PipelineConfig, RelayConfig, TelegramConfig};
use crate::validate::{
    parse_base_url, parse_log_format, parse_u64_at_least, parse_unit_interval,
    parse_usize_at_least, require_non_empty,
};

/// Load configuration from the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] naming the first missing or invalid variable.
pub fn load_from_env() -> ConfigResult<RelayConfig> {
    load_with(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup.
///
/// # Errors
///
/// Returns a [`ConfigError`] naming the first missing or invalid variable.
pub fn load_with<F>(lookup: F) -> ConfigResult<RelayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Lookup { inner: &lookup };

    let telegram = TelegramConfig {
        bot_token: env.required(BOT_TOKEN_VAR)?,
        api_base: env.parsed(API_BASE_VAR, defaults::API_BASE.to_string(), |raw| {
            parse_base_url(API_BASE_VAR, raw)
        })?,
    };
    let database_url = env.required(DATABASE_URL_VAR)?;

    let pipeline = PipelineConfig {
        similarity_threshold: env.parsed(
            SIMILARITY_THRESHOLD_VAR,
            defaults::SIMILARITY_THRESHOLD,
            |raw| parse_unit_interval(SIMILARITY_THRESHOLD_VAR, raw),
        )?,
        quiet_window: env.seconds(QUIET_WINDOW_VAR, defaults::QUIET_WINDOW_SECS, 1)?,
        sweep_interval: env.millis(SWEEP_INTERVAL_VAR, defaults::SWEEP_INTERVAL_MS, 10)?,
        notice_cooldown: env.seconds(NOTICE_COOLDOWN_VAR, defaults::NOTICE_COOLDOWN_SECS, 1)?,
        files_per_post: env.parsed(FILES_PER_POST_VAR, defaults::FILES_PER_POST, |raw| {
            parse_usize_at_least(FILES_PER_POST_VAR, raw, 1)
        })?,
        send_delay: env.millis(SEND_DELAY_VAR, defaults::SEND_DELAY_MS, 0)?,
        flood_buffer: env.seconds(FLOOD_BUFFER_VAR, defaults::FLOOD_BUFFER_SECS, 0)?,
        archive_backoff: env.seconds(ARCHIVE_BACKOFF_VAR, defaults::ARCHIVE_BACKOFF_SECS, 1)?,
        queue_capacity: env.parsed(QUEUE_CAPACITY_VAR, defaults::QUEUE_CAPACITY, |raw| {
            parse_usize_at_least(QUEUE_CAPACITY_VAR, raw, 1)
        })?,
        notice_text: env.parsed(NOTICE_TEXT_VAR, defaults::NOTICE_TEXT.to_string(), |raw| {
            require_non_empty(NOTICE_TEXT_VAR, raw)
        })?,
        public_base_url: env.parsed(
            PUBLIC_BASE_URL_VAR,
            defaults::PUBLIC_BASE_URL.to_string(),
            |raw| parse_base_url(PUBLIC_BASE_URL_VAR, raw),
        )?,
    };

    let log_level = env.parsed(LOG_LEVEL_VAR, defaults::LOG_LEVEL.to_string(), |raw| {
        require_non_empty(LOG_LEVEL_VAR, raw)
    })?;
    let log_format = env
        .raw(LOG_FORMAT_VAR)
        .map(|raw| parse_log_format(LOG_FORMAT_VAR, &raw))
        .transpose()?;

    Ok(RelayConfig {
        telegram,
        database_url,
        pipeline,
        log_level,
        log_format,
    })
}

struct Lookup<'a, F> {
    inner: &'a F,
}

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, field: &'static str) -> Option<String> {
        (self.inner)(field).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, field: &'static str) -> ConfigResult<String> {
        let raw = self.raw(field).ok_or(ConfigError::MissingField { field })?;
        require_non_empty(field, &raw)
    }

    fn parsed<T>(
        &self,
        field: &'static str,
        fallback: T,
        parse: impl FnOnce(&str) -> ConfigResult<T>,
    ) -> ConfigResult<T> {
        match self.raw(field) {
            Some(raw) => parse(&raw),
            None => {
                debug!(field, "configuration value not set; using default");
                Ok(fallback)
            }
        }
    }

    fn seconds(&self, field: &'static str, fallback: u64, min: u64) -> ConfigResult<Duration> {
        self.parsed(field, fallback, |raw| parse_u64_at_least(field, raw, min))
            .map(Duration::from_secs)
    }

    fn millis(&self, field: &'static str, fallback: u64, min: u64) -> ConfigResult<Duration> {
        self.parsed(field, fallback, |raw| parse_u64_at_least(field, raw, min))
            .map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required_only() -> Vec<(&'static str, &'static str)> {
        vec![
            ("REELCAST_BOT_TOKEN", "123:abc"),
            ("DATABASE_URL", "postgres://localhost/reelcast"),
        ]
    }

    #[test]
    fn defaults_apply_when_optional_values_missing() -> anyhow::Result<()> {
        let config = load_with(lookup_from(&required_only()))?;
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.log_level, "info");
        assert!(config.log_format.is_none());
        Ok(())
    }

    #[test]
    fn overrides_are_parsed() -> anyhow::Result<()> {
        let mut pairs = required_only();
        pairs.extend([
            ("REELCAST_SIMILARITY_THRESHOLD", "0.7"),
            ("REELCAST_QUIET_WINDOW_SECS", "3"),
            ("REELCAST_SWEEP_INTERVAL_MS", "250"),
            ("REELCAST_FILES_PER_POST", "10"),
            ("REELCAST_SEND_DELAY_MS", "0"),
            ("REELCAST_QUEUE_CAPACITY", "8"),
            ("REELCAST_PUBLIC_BASE_URL", "https://links.example/"),
            ("REELCAST_LOG_FORMAT", "json"),
        ]);
        let config = load_with(lookup_from(&pairs))?;
        let pipeline = &config.pipeline;
        assert!((pipeline.similarity_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(pipeline.quiet_window, Duration::from_secs(3));
        assert_eq!(pipeline.sweep_interval, Duration::from_millis(250));
        assert_eq!(pipeline.files_per_post, 10);
        assert_eq!(pipeline.send_delay, Duration::ZERO);
        assert_eq!(pipeline.queue_capacity, 8);
        assert_eq!(pipeline.public_base_url, "https://links.example");
        assert_eq!(config.log_format.as_deref(), Some("json"));
        Ok(())
    }

    #[test]
    fn missing_token_is_reported() {
        let err = load_with(lookup_from(&[("DATABASE_URL", "postgres://db")]))
            .expect_err("token is required");
        assert_eq!(
            err,
            ConfigError::MissingField {
                field: "REELCAST_BOT_TOKEN"
            }
        );
    }

    #[test]
    fn invalid_values_are_not_defaulted() {
        let mut pairs = required_only();
        pairs.push(("REELCAST_FILES_PER_POST", "0"));
        let err = load_with(lookup_from(&pairs)).expect_err("zero page size rejected");
        assert_eq!(err.field(), "REELCAST_FILES_PER_POST");
        assert_eq!(err.to_string(), "invalid configuration field");
    }
}
