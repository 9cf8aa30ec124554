//! Client-side request resilience.
//!
//! Backstop sits between application code and an HTTP-capable transport
//! and decides *when*, *where*, and *how many times* to attempt each
//! operation, what to serve from cache instead of the network, and when
//! to stop attempting altogether to protect a failing backend.
//!
//! The transport is any `tower::Service<TransportRequest>`; backstop
//! never touches the wire itself.
//!
//! # Example
//!
//! ```
//! use backstop::{
//!     CachePolicy, Client, ClientConfig, RequestDescriptor, TransportError, TransportResponse,
//! };
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let transport = tower::service_fn(|req: backstop::TransportRequest| async move {
//!     // A real transport performs the HTTP call here.
//!     Ok::<_, TransportError>(TransportResponse::new(200, format!("hit {}", req.url)))
//! });
//!
//! let config = ClientConfig::builder("https://api.example.com")
//!     .backup_url("https://api-fallback.example.com")
//!     .timeout(Duration::from_secs(10))
//!     .default_max_retries(2)
//!     .build();
//! let client = Client::new(config, transport);
//!
//! let handle = client.submit(
//!     RequestDescriptor::get("/users")
//!         .param("page", "1")
//!         .cache_policy(CachePolicy::CacheElseNetwork)
//!         .build(),
//! );
//! let delivery = handle.finish().await.unwrap();
//! assert_eq!(delivery.payload, b"hit https://api.example.com/users");
//! # }
//! ```
//!
//! # What gates a request
//!
//! 1. **Dispatch queue** - at most `max_concurrent` requests run at once;
//!    the rest park in FIFO or priority order.
//! 2. **Rate limiter** - a per-key sliding window; rejections are
//!    terminal and consume no other budget.
//! 3. **Circuit breaker** - per-key consecutive-failure tracking;
//!    an open circuit rejects with a distinct error.
//! 4. **Cache policy** - one of six rules deciding when the cache is
//!    read or written relative to the network attempt.
//! 5. **Retry & failover** - per-target retries (fixed or policy-driven
//!    backoff), then the next configured host, then terminal failure.
//!
//! # Feature flags
//! - `metrics`: counters and gauges via the `metrics` crate

pub use backstop_core::{
    ClientEvent, EventListener, EventListeners, FnListener, Method, RequestError, TransportError,
    TransportErrorKind, TransportRequest, TransportResponse,
};

pub use backstop_breaker::{
    BreakerConfig, BreakerEvent, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState,
};
pub use backstop_cache::{
    CacheEntry, CacheStorage, CacheStore, DirStorage, MemoryStorage, cache_key,
};
pub use backstop_queue::{Discipline, DispatchQueue, Priority};
pub use backstop_ratelimit::{RateRule, SlidingWindowLimiter};
pub use backstop_retry::{
    Conditional, ExponentialBackoff, FixedDelay, JitteredBackoff, RetryPolicy,
};

mod client;
mod config;
mod descriptor;
mod events;
mod executor;
mod handle;

pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use descriptor::{CachePolicy, RequestDescriptor, RequestDescriptorBuilder, ValidateFn};
pub use events::RequestEvent;
pub use handle::{Delivery, DeliverySource, RequestHandle};
