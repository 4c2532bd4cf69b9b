//! Error types for pipeline operations.

use std::error::Error;

use reelcast_core::TransportError;
use thiserror::Error;
use tokio::task::JoinError;

/// Primary error type for the relay pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A remote transport call failed with a non-throttling error.
    #[error("remote transport call failed")]
    Transport {
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
    /// A persistence store call failed.
    #[error("persistence operation failed")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The post composer could not build drafts for a batch.
    #[error("post composition failed")]
    Compose {
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// No archive channel was configured before the worker stopped waiting.
    #[error("archive channel is not configured")]
    ArchiveUnavailable,
    /// The ingestion queue has no free capacity.
    #[error("ingestion queue is full")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },
    /// The ingestion queue no longer accepts events.
    #[error("ingestion queue is closed")]
    QueueClosed,
    /// A background task panicked or was cancelled.
    #[error("background task failed")]
    TaskJoin {
        /// Task identifier.
        task: &'static str,
        /// Underlying join failure.
        #[source]
        source: JoinError,
    },
}

impl PipelineError {
    pub(crate) const fn transport(source: TransportError) -> Self {
        Self::Transport { source }
    }

    pub(crate) fn store(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Store {
            operation,
            source: source.into(),
        }
    }

    pub(crate) fn compose(source: anyhow::Error) -> Self {
        Self::Compose {
            source: source.into(),
        }
    }
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = Result<T, PipelineError>;
