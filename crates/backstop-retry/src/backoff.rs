use crate::policy::RetryPolicy;
use backstop_core::RequestError;
use rand::RngExt;
use std::time::Duration;

/// Exponential backoff: `delay = min(base * multiplier^(attempt - 1), cap)`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_attempts: usize,
    base: Duration,
    multiplier: f64,
    cap: Duration,
}

impl ExponentialBackoff {
    pub fn new(max_attempts: usize, base: Duration) -> Self {
        Self {
            max_attempts,
            base,
            multiplier: 2.0,
            cap: Duration::from_secs(60),
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    fn exponential(&self, attempt: usize) -> Duration {
        let exponent = attempt.max(1) as i32 - 1;
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs).min(self.cap)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn should_retry(&self, attempt: usize, error: &RequestError) -> bool {
        error.is_recoverable() && attempt < self.max_attempts
    }

    fn delay(&self, attempt: usize) -> Duration {
        self.exponential(attempt)
    }
}

/// Exponential backoff with uniform random jitter of up to 30% added on
/// top of the exponential value, capped the same way. Jitter spreads out
/// retries from clients that failed at the same instant.
#[derive(Debug, Clone)]
pub struct JitteredBackoff {
    inner: ExponentialBackoff,
}

impl JitteredBackoff {
    pub fn new(max_attempts: usize, base: Duration) -> Self {
        Self {
            inner: ExponentialBackoff::new(max_attempts, base),
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.inner = self.inner.multiplier(multiplier);
        self
    }

    pub fn cap(mut self, cap: Duration) -> Self {
        self.inner = self.inner.cap(cap);
        self
    }
}

impl Default for JitteredBackoff {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

impl RetryPolicy for JitteredBackoff {
    fn should_retry(&self, attempt: usize, error: &RequestError) -> bool {
        self.inner.should_retry(attempt, error)
    }

    fn delay(&self, attempt: usize) -> Duration {
        let exponential = self.inner.exponential(attempt);
        let jitter = exponential.mul_f64(rand::rng().random_range(0.0..=0.3));
        (exponential + jitter).min(self.inner.cap)
    }
}
