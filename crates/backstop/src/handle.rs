use backstop_core::RequestError;
use tokio::sync::{mpsc, oneshot};

/// Where a delivered payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySource {
    Cache,
    Network,
}

/// One payload delivered to the caller, tagged with its origin.
///
/// The tag matters under [`CachePolicy::CacheThenNetwork`], which first
/// delivers the cached payload and later the fresh one; callers should
/// branch on the tag rather than on call order.
///
/// [`CachePolicy::CacheThenNetwork`]: crate::CachePolicy::CacheThenNetwork
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub source: DeliverySource,
}

impl Delivery {
    pub(crate) fn cached(payload: Vec<u8>) -> Self {
        Self {
            payload,
            source: DeliverySource::Cache,
        }
    }

    pub(crate) fn fresh(payload: Vec<u8>) -> Self {
        Self {
            payload,
            source: DeliverySource::Network,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.source == DeliverySource::Cache
    }
}

/// The caller's end of one submitted request.
///
/// Every request yields exactly one terminal outcome, except
/// `CacheThenNetwork` which yields a non-terminal cached delivery first.
/// Dropping the handle cancels the request.
pub struct RequestHandle {
    rx: mpsc::Receiver<Result<Delivery, RequestError>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl RequestHandle {
    pub(crate) fn new(
        rx: mpsc::Receiver<Result<Delivery, RequestError>>,
        cancel: oneshot::Sender<()>,
    ) -> Self {
        Self {
            rx,
            cancel: Some(cancel),
        }
    }

    /// Receives the next delivery, or `None` once the request is done.
    ///
    /// Policies other than `CacheThenNetwork` yield at most one delivery.
    pub async fn next(&mut self) -> Option<Result<Delivery, RequestError>> {
        self.rx.recv().await
    }

    /// Waits for the terminal outcome, discarding any earlier
    /// non-terminal delivery. A cancelled request resolves to
    /// [`RequestError::Cancelled`].
    pub async fn finish(mut self) -> Result<Delivery, RequestError> {
        let mut last = None;
        while let Some(outcome) = self.rx.recv().await {
            last = Some(outcome);
        }
        last.unwrap_or(Err(RequestError::Cancelled))
    }

    /// Cancels the request: the in-flight transport call is aborted, any
    /// scheduled retry is discarded, and no further deliveries arrive.
    /// Cancellation consumes neither circuit-breaker nor rate-limiter
    /// budget.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("cancelled", &self.cancel.is_none())
            .finish_non_exhaustive()
    }
}
