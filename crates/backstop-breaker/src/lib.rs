//! Circuit breakers for backstop.
//!
//! A breaker watches consecutive failures against one key (typically an
//! endpoint path) and stops sending requests to a backend that keeps
//! failing.
//!
//! ## States
//! - **Closed**: requests pass; consecutive failures are counted
//! - **Open**: requests are rejected until the open timeout elapses
//! - **HalfOpen**: probe requests pass; enough successes close the
//!   circuit, a single failure re-opens it
//!
//! ```
//! use backstop_breaker::{BreakerConfig, BreakerRegistry, CircuitState};
//! use std::time::Duration;
//!
//! let registry = BreakerRegistry::new(BreakerConfig {
//!     failure_threshold: 3,
//!     success_threshold: 1,
//!     open_timeout: Duration::from_secs(30),
//! });
//!
//! let breaker = registry.breaker("/users");
//! assert!(breaker.allow_request());
//! for _ in 0..3 {
//!     breaker.record_failure();
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(!breaker.allow_request());
//! ```
//!
//! Registries are plain values owned by whoever composes them - there is
//! no process-wide breaker table, so tests and independent clients get
//! isolated state for free.

mod circuit;
mod events;
mod registry;

pub use circuit::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use events::BreakerEvent;
pub use registry::BreakerRegistry;
