use crate::config::ClientConfig;
use crate::descriptor::RequestDescriptor;
use crate::executor::{ClientShared, RequestExecutor};
use crate::handle::RequestHandle;
use backstop_breaker::BreakerRegistry;
use backstop_cache::{CacheStore, MemoryStorage};
use backstop_core::{TransportError, TransportRequest, TransportResponse};
use backstop_queue::DispatchQueue;
use backstop_ratelimit::SlidingWindowLimiter;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tower::Service;

/// The request-resilience client.
///
/// Owns the dispatch queue and the per-key registries (breakers, rate
/// windows, cache), and composes them around the transport service it is
/// given. Clones share all of that state, so a client can be handed to as
/// many tasks as needed.
///
/// Requests are described by a [`RequestDescriptor`] and submitted with
/// [`Client::submit`]; execution order is governed by the queue's
/// discipline and concurrency budget.
pub struct Client<S> {
    transport: S,
    shared: Arc<ClientShared>,
    queue: DispatchQueue,
}

impl<S: Clone> Clone for Client<S> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            shared: Arc::clone(&self.shared),
            queue: self.queue.clone(),
        }
    }
}

impl<S> Client<S> {
    /// Builds a client from a configuration and a transport service.
    ///
    /// When no persistent cache storage is configured, the cache falls
    /// back to process-local memory storage.
    pub fn new(config: ClientConfig, transport: S) -> Self {
        let storage = config
            .cache_storage
            .clone()
            .unwrap_or_else(|| Arc::new(MemoryStorage::default()));
        let cache = CacheStore::new(config.cache_capacity, storage);
        let breakers =
            BreakerRegistry::with_listeners(config.breaker.clone(), config.breaker_listeners.clone());
        let limiter = SlidingWindowLimiter::new(config.rate_rule);
        let queue = DispatchQueue::new(config.discipline, config.max_concurrent);

        Self {
            transport,
            shared: Arc::new(ClientShared {
                config,
                breakers,
                limiter,
                cache,
            }),
            queue,
        }
    }

    /// The circuit-breaker registry backing this client.
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.shared.breakers
    }

    /// The rate limiter backing this client.
    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.shared.limiter
    }

    /// The two-tier cache backing this client.
    pub fn cache(&self) -> &CacheStore {
        &self.shared.cache
    }

    /// The dispatch queue backing this client.
    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Cancels everything: running requests are aborted, pending ones are
    /// discarded (their handles resolve as cancelled).
    pub fn cancel_all(&self) {
        self.queue.cancel_all();
    }

    /// Adjusts the concurrency budget; raising it drains pending work
    /// immediately.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.queue.set_max_concurrent(max_concurrent);
    }
}

impl<S> Client<S>
where
    S: Service<TransportRequest, Response = TransportResponse, Error = TransportError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    /// Submits a request for execution and returns its handle.
    ///
    /// The request is admitted by the queue (by priority under the
    /// priority discipline), then by the rate limiter and circuit
    /// breaker, and only then reaches the transport. The handle delivers
    /// the outcome; dropping it cancels the request.
    pub fn submit(&self, descriptor: RequestDescriptor) -> RequestHandle {
        let (tx, rx) = mpsc::channel(2);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let priority = descriptor.priority();

        let executor = RequestExecutor::new(
            self.transport.clone(),
            Arc::clone(&self.shared),
            descriptor,
            tx,
            cancel_rx,
        );
        self.queue.enqueue(priority, executor.run());

        RequestHandle::new(rx, cancel_tx)
    }
}
