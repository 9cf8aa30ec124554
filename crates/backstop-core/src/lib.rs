//! Core infrastructure shared by the backstop crates.
//!
//! This crate defines the pieces every other backstop module speaks in:
//! - the transport boundary types ([`TransportRequest`], [`TransportResponse`],
//!   [`TransportError`]) that the executor hands to and receives from the
//!   wire-level collaborator,
//! - the unified [`RequestError`] taxonomy surfaced to callers,
//! - the event system ([`EventListeners`], [`FnListener`]) used for
//!   observability across the breaker and the request executor.
//!
//! It deliberately contains no policy logic of its own.

pub mod error;
pub mod events;
pub mod transport;

pub use error::RequestError;
pub use events::{ClientEvent, EventListener, EventListeners, FnListener};
pub use transport::{
    Method, TransportError, TransportErrorKind, TransportRequest, TransportResponse,
};
