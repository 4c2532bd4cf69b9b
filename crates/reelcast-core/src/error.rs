//! Error types for remote transport calls.

use std::error::Error;
use std::time::Duration;

use thiserror::Error;

use crate::model::ChannelId;

/// Failure reported by a [`RemoteTransport`](crate::RemoteTransport) call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote side asked the caller to slow down.
    #[error("remote transport rate limited")]
    RateLimited {
        /// Operation identifier.
        operation: &'static str,
        /// Cooldown mandated by the remote side.
        retry_after: Duration,
    },
    /// The relay lacks rights in the target chat.
    #[error("remote transport permission denied")]
    PermissionDenied {
        /// Operation identifier.
        operation: &'static str,
        /// Chat that refused the call.
        channel: ChannelId,
        /// Remote description of the refusal.
        detail: String,
    },
    /// The remote side rejected the request for another reason.
    #[error("remote transport rejected request")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// Remote error code.
        code: u16,
        /// Remote description of the rejection.
        description: String,
    },
    /// The request never produced a usable response.
    #[error("remote transport request failed")]
    Request {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl TransportError {
    /// Cooldown to honour before retrying, when the failure is transient throttling.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Operation that produced the failure.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::RateLimited { operation, .. }
            | Self::PermissionDenied { operation, .. }
            | Self::Rejected { operation, .. }
            | Self::Request { operation, .. } => operation,
        }
    }

    /// Wrap an arbitrary error as a request failure.
    pub fn request(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Request {
            operation,
            source: source.into(),
        }
    }
}

/// Convenience alias for transport results.
pub type TransportResult<T> = Result<T, TransportError>;
