//! The unified error taxonomy surfaced to callers.

use crate::transport::TransportError;
use thiserror::Error;

/// Everything that can terminate (or interrupt) a logical request.
///
/// Only [`Transport`](RequestError::Transport) and
/// [`Validation`](RequestError::Validation) are recoverable through retry
/// and base-URL failover; the admission rejections and `Cancelled` are
/// terminal the moment they occur.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The transport collaborator failed, or the attempt timed out.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response arrived but the descriptor's validation predicate
    /// rejected it. Counts against the same retry/failover budget as a
    /// transport failure.
    #[error("response validation failed: {reason}")]
    Validation { reason: String },

    /// A cache-only request found no valid entry.
    #[error("no valid cache entry")]
    CacheMiss,

    /// The circuit breaker for this key rejected the request.
    #[error("circuit breaker open for {key:?}")]
    CircuitOpen { key: String },

    /// The rate limiter for this key rejected the request.
    #[error("rate limit exceeded for {key:?}")]
    RateLimited { key: String },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
}

impl RequestError {
    pub fn validation(reason: impl Into<String>) -> Self {
        RequestError::Validation {
            reason: reason.into(),
        }
    }

    /// True when retry/failover may still recover this request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RequestError::Transport(_) | RequestError::Validation { .. }
        )
    }

    /// True when the request was refused before any transport attempt.
    pub fn is_admission_rejection(&self) -> bool {
        matches!(
            self,
            RequestError::CircuitOpen { .. } | RequestError::RateLimited { .. }
        )
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RequestError::CircuitOpen { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RequestError::RateLimited { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RequestError::Cancelled)
    }

    /// Extracts the transport error, if any.
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            RequestError::Transport(e) => Some(e),
            _ => None,
        }
    }
}
