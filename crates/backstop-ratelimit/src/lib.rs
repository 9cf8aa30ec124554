//! Sliding-window request admission for backstop.
//!
//! The limiter is an admission gate evaluated before any transport
//! attempt: either the request is recorded and allowed, or it is rejected
//! without consuming anything. Rejections never count against retry or
//! circuit-breaker budgets.
//!
//! ```
//! use backstop_ratelimit::{RateRule, SlidingWindowLimiter};
//! use std::time::Duration;
//!
//! let limiter = SlidingWindowLimiter::new(RateRule {
//!     window: Duration::from_secs(60),
//!     max_requests: 2,
//! });
//! assert!(limiter.should_allow("/search"));
//! assert!(limiter.should_allow("/search"));
//! assert!(!limiter.should_allow("/search"));
//! // Other keys have their own window.
//! assert!(limiter.should_allow("/users"));
//! ```

mod limiter;

pub use limiter::{RateRule, SlidingWindowLimiter};
