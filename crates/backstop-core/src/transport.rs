//! Types crossing the transport boundary.
//!
//! The executor describes one attempt with a [`TransportRequest`] and the
//! transport collaborator answers with a [`TransportResponse`] or a
//! [`TransportError`]. Wire format, TLS, and DNS are entirely the
//! collaborator's business.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// HTTP-style request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fully resolved attempt, ready for the transport collaborator.
///
/// `params` are kept as a sorted map rather than an encoded query string so
/// the collaborator can place them per the method (query vs. body) and so
/// cache-key derivation sees a canonical ordering.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    /// Effective timeout for this attempt (descriptor override or the
    /// client-wide default).
    pub timeout: Duration,
}

/// Raw result of a successful transport attempt.
///
/// The payload is opaque to backstop; parsing it is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub payload: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            payload: payload.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Category of a transport-level failure.
///
/// The conditional retry policy treats the first four kinds as transient;
/// everything else is assumed to fail again no matter how often it is
/// reattempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The attempt did not complete within its effective timeout.
    Timeout,
    /// The connection dropped mid-flight.
    ConnectionLost,
    /// The host could not be reached.
    HostUnreachable,
    /// No network connectivity at all.
    NotConnected,
    /// The collaborator reported a protocol-level problem.
    Protocol,
    /// Anything else.
    Other,
}

impl TransportErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            TransportErrorKind::Timeout
                | TransportErrorKind::ConnectionLost
                | TransportErrorKind::HostUnreachable
                | TransportErrorKind::NotConnected
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::ConnectionLost => "connection lost",
            TransportErrorKind::HostUnreachable => "host unreachable",
            TransportErrorKind::NotConnected => "not connected",
            TransportErrorKind::Protocol => "protocol error",
            TransportErrorKind::Other => "transport failure",
        };
        f.write_str(s)
    }
}

/// A failed transport attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The error the executor synthesizes when an attempt's timeout elapses.
    pub fn timeout() -> Self {
        Self::new(TransportErrorKind::Timeout, "attempt timed out")
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(TransportError::timeout().is_transient());
        assert!(TransportError::new(TransportErrorKind::ConnectionLost, "x").is_transient());
        assert!(!TransportError::new(TransportErrorKind::Protocol, "x").is_transient());
        assert!(!TransportError::new(TransportErrorKind::Other, "x").is_transient());
    }

    #[test]
    fn response_success_range() {
        assert!(TransportResponse::new(200, b"ok".to_vec()).is_success());
        assert!(TransportResponse::new(299, vec![]).is_success());
        assert!(!TransportResponse::new(304, vec![]).is_success());
        assert!(!TransportResponse::new(500, vec![]).is_success());
    }

    #[test]
    fn error_display_includes_kind() {
        let err = TransportError::new(TransportErrorKind::HostUnreachable, "no route");
        assert_eq!(err.to_string(), "host unreachable: no route");
    }
}
