//! Retry policies for backstop.
//!
//! A [`RetryPolicy`] answers two questions after a failed attempt: should
//! the executor try again, and how long should it wait first. The four
//! provided policies are interchangeable behind `Arc<dyn RetryPolicy>`:
//!
//! - [`FixedDelay`] - bounded attempts, constant delay
//! - [`ExponentialBackoff`] - delay grows by a multiplier, capped
//! - [`JitteredBackoff`] - exponential plus up to 30% random jitter
//! - [`Conditional`] - retries transient transport failures only
//!
//! A descriptor that selects none of these falls back to the executor's
//! simple fixed-count/fixed-delay path.
//!
//! ```
//! use backstop_retry::{ExponentialBackoff, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = ExponentialBackoff::new(5, Duration::from_millis(100));
//! assert_eq!(policy.delay(1), Duration::from_millis(100));
//! assert_eq!(policy.delay(3), Duration::from_millis(400));
//! ```

mod backoff;
mod policy;

pub use backoff::{ExponentialBackoff, JitteredBackoff};
pub use policy::{Conditional, FixedDelay, RetryPolicy};
