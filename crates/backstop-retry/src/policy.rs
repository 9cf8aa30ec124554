use backstop_core::RequestError;
use std::time::Duration;

/// Decides whether and when a failed attempt is retried.
///
/// `attempt` is the number of attempts already made against the current
/// target, so the first decision after the initial failure sees
/// `attempt == 1`.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, attempt: usize, error: &RequestError) -> bool;

    fn delay(&self, attempt: usize) -> Duration;
}

/// Retries every recoverable failure up to `max_attempts` total attempts,
/// waiting a constant delay between them.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    max_attempts: usize,
    delay: Duration,
}

impl FixedDelay {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy for FixedDelay {
    fn should_retry(&self, attempt: usize, error: &RequestError) -> bool {
        error.is_recoverable() && attempt < self.max_attempts
    }

    fn delay(&self, _attempt: usize) -> Duration {
        self.delay
    }
}

/// Retries only failures whose transport kind is transient (timeout,
/// connection lost, host unreachable, not connected). Validation failures
/// and non-transient transport errors are never retried, regardless of how
/// much budget remains.
#[derive(Debug, Clone)]
pub struct Conditional {
    max_attempts: usize,
    delay: Duration,
}

impl Conditional {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for Conditional {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy for Conditional {
    fn should_retry(&self, attempt: usize, error: &RequestError) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        error
            .as_transport()
            .map(|e| e.is_transient())
            .unwrap_or(false)
    }

    fn delay(&self, _attempt: usize) -> Duration {
        self.delay
    }
}
