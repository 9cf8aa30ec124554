use backstop_core::{ClientEvent, RequestError};
use std::time::{Duration, Instant};

/// Observable request-lifecycle activity.
///
/// Every attempt is visible through these events, but nothing in the
/// executor's decision-making depends on whether anyone listens.
#[derive(Debug, Clone)]
pub enum RequestEvent {
    /// A transport attempt is about to start.
    AttemptStarted {
        path: String,
        target: String,
        /// 1-indexed attempt number against the current target.
        attempt: usize,
        timestamp: Instant,
    },
    /// A transport attempt failed (or its response failed validation).
    AttemptFailed {
        path: String,
        attempt: usize,
        error: RequestError,
        timestamp: Instant,
    },
    /// A retry was scheduled against the same target.
    RetryScheduled {
        path: String,
        /// 1-indexed retry number.
        attempt: usize,
        delay: Duration,
        timestamp: Instant,
    },
    /// Retries were exhausted and the request moved to the next host.
    FailedOver {
        path: String,
        target: String,
        timestamp: Instant,
    },
    /// A valid cache entry was served.
    CacheHit {
        path: String,
        key: String,
        timestamp: Instant,
    },
    /// The request reached its terminal outcome.
    Completed {
        path: String,
        success: bool,
        /// Total transport attempts across all targets (zero when the
        /// request never reached the network).
        attempts: usize,
        timestamp: Instant,
    },
}

impl ClientEvent for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::AttemptStarted { .. } => "attempt_started",
            RequestEvent::AttemptFailed { .. } => "attempt_failed",
            RequestEvent::RetryScheduled { .. } => "retry_scheduled",
            RequestEvent::FailedOver { .. } => "failed_over",
            RequestEvent::CacheHit { .. } => "cache_hit",
            RequestEvent::Completed { .. } => "completed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RequestEvent::AttemptStarted { timestamp, .. }
            | RequestEvent::AttemptFailed { timestamp, .. }
            | RequestEvent::RetryScheduled { timestamp, .. }
            | RequestEvent::FailedOver { timestamp, .. }
            | RequestEvent::CacheHit { timestamp, .. }
            | RequestEvent::Completed { timestamp, .. } => *timestamp,
        }
    }
}
