//! # Design
//!
//! - Centralize application-level errors for bootstrap and shutdown.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;

use reelcast_core::TransportError;
use thiserror::Error;
use tokio::task::JoinError;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: reelcast_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: reelcast_telemetry::TelemetryError,
    },
    /// Persistence operations failed.
    #[error("data operation failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data error.
        source: reelcast_data::DataError,
    },
    /// Bot API client operations failed.
    #[error("transport operation failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Source transport error.
        source: TransportError,
    },
    /// Relay pipeline operations failed.
    #[error("pipeline operation failed")]
    Pipeline {
        /// Operation identifier.
        operation: &'static str,
        /// Source pipeline error.
        source: reelcast_pipeline::PipelineError,
    },
    /// A background task panicked or was cancelled.
    #[error("background task join failed")]
    TaskJoin {
        /// Task identifier.
        task: &'static str,
        /// Source join error.
        source: JoinError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: reelcast_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: reelcast_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn data(operation: &'static str, source: reelcast_data::DataError) -> Self {
        Self::Data { operation, source }
    }

    pub(crate) const fn transport(operation: &'static str, source: TransportError) -> Self {
        Self::Transport { operation, source }
    }

    pub(crate) const fn pipeline(
        operation: &'static str,
        source: reelcast_pipeline::PipelineError,
    ) -> Self {
        Self::Pipeline { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.load_from_env",
            reelcast_config::ConfigError::MissingField {
                field: "DATABASE_URL",
            },
        );
        assert!(matches!(
            config,
            AppError::Config {
                operation: "config.load_from_env",
                ..
            }
        ));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let transport = AppError::transport(
            "bot_api.new",
            TransportError::request("build_client", io::Error::other("tls")),
        );
        assert!(matches!(transport, AppError::Transport { .. }));

        let pipeline =
            AppError::pipeline("relay.shutdown", reelcast_pipeline::PipelineError::QueueClosed);
        assert_eq!(pipeline.to_string(), "pipeline operation failed");

        let data = AppError::data(
            "store.preferences",
            reelcast_data::DataError::InvalidValue {
                field: "footer_buttons",
                source: None,
            },
        );
        assert!(matches!(data, AppError::Data { .. }));
        assert_eq!(data.to_string(), "data operation failed");
    }
}
