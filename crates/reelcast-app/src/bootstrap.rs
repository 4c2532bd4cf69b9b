use std::sync::Arc;

use reelcast_botapi::{BotApi, UpdatePoller, poller::DEFAULT_LONG_POLL};
use reelcast_config::RelayConfig;
use reelcast_core::NoPoster;
use reelcast_data::PgStore;
use reelcast_events::EventBus;
use reelcast_pipeline::{Relay, RelayDependencies, ReleaseComposer};
use reelcast_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha, init_logging};
use tokio::sync::watch;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::polling::{POLL_RETRY, run_polling};

/// Entry point for the relay boot sequence.
///
/// Runs until Ctrl-C, then stops polling, drains the ingestion queue, and
/// publishes every batch that is still open.
///
/// # Errors
///
/// Returns an error if configuration, logging, storage, or client setup fails,
/// or if a background task panics during shutdown.
pub async fn run_app() -> AppResult<()> {
    let config = reelcast_config::load_from_env()
        .map_err(|err| AppError::config("config.load_from_env", err))?;
    init_logging(&logging_config(&config))
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    info!(
        build_sha = build_sha(),
        api_base = %config.telegram.api_base,
        "reelcast bootstrap starting"
    );

    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let events = EventBus::new();
    let store = Arc::new(
        PgStore::connect(&config.database_url)
            .await
            .map_err(|err| AppError::data("store.connect", err))?,
    );
    let api = BotApi::new(&config.telegram.api_base, config.telegram.bot_token.clone())
        .map_err(|err| AppError::transport("bot_api.new", err))?;

    let composer = ReleaseComposer::new(
        store.clone(),
        Arc::new(NoPoster),
        config.pipeline.public_base_url.clone(),
        config.pipeline.files_per_post,
    );
    let relay = Relay::spawn(
        &config.pipeline,
        RelayDependencies {
            transport: Arc::new(api.clone()),
            store,
            composer: Arc::new(composer),
            events,
            metrics: metrics.clone(),
        },
    );

    let (stop_polling, polling_signal) = watch::channel(false);
    let poller = UpdatePoller::new(api, DEFAULT_LONG_POLL);
    let polling = tokio::spawn(run_polling(
        poller,
        relay.intake().clone(),
        polling_signal,
        POLL_RETRY,
    ));
    info!("reelcast relay running");

    tokio::signal::ctrl_c()
        .await
        .map_err(|source| AppError::Io {
            operation: "signal.ctrl_c",
            source,
        })?;
    info!("shutdown requested");

    stop_polling.send_replace(true);
    polling.await.map_err(|source| AppError::TaskJoin {
        task: "update_poller",
        source,
    })?;
    relay
        .shutdown()
        .await
        .map_err(|err| AppError::pipeline("relay.shutdown", err))?;

    let snapshot = metrics.snapshot();
    info!(
        files_ingested = snapshot.files_ingested_total,
        batches_finalized = snapshot.batches_finalized_total,
        posts_sent = snapshot.posts_sent_total,
        "reelcast shutdown complete"
    );
    Ok(())
}

fn logging_config(config: &RelayConfig) -> LoggingConfig<'_> {
    LoggingConfig {
        level: &config.log_level,
        format: LogFormat::from_setting(config.log_format.as_deref()),
        build_sha: build_sha(),
    }
}
