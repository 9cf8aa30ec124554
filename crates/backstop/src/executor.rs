use crate::config::ClientConfig;
use crate::descriptor::{CachePolicy, RequestDescriptor};
use crate::events::RequestEvent;
use crate::handle::Delivery;
use backstop_breaker::BreakerRegistry;
use backstop_cache::{CacheStore, cache_key};
use backstop_core::{RequestError, TransportError, TransportRequest, TransportResponse};
use backstop_ratelimit::SlidingWindowLimiter;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tower::{Service, ServiceExt};

/// Everything shared across a client's concurrent requests: the config
/// plus the per-key registries. Executors hold an `Arc` to it; all
/// per-request state lives in the executor itself.
pub(crate) struct ClientShared {
    pub(crate) config: ClientConfig,
    pub(crate) breakers: BreakerRegistry,
    pub(crate) limiter: SlidingWindowLimiter,
    pub(crate) cache: CacheStore,
}

enum AttemptError {
    Cancelled,
    Transport(TransportError),
}

/// Drives one logical request from first attempt to terminal outcome.
///
/// Owned by exactly one task; nothing else mutates its state.
pub(crate) struct RequestExecutor<S> {
    transport: S,
    shared: Arc<ClientShared>,
    descriptor: RequestDescriptor,
    tx: mpsc::Sender<Result<Delivery, RequestError>>,
    cancel: oneshot::Receiver<()>,
    /// Total transport attempts across all targets.
    attempts: usize,
}

impl<S> RequestExecutor<S>
where
    S: Service<TransportRequest, Response = TransportResponse, Error = TransportError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    pub(crate) fn new(
        transport: S,
        shared: Arc<ClientShared>,
        descriptor: RequestDescriptor,
        tx: mpsc::Sender<Result<Delivery, RequestError>>,
        cancel: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            transport,
            shared,
            descriptor,
            tx,
            cancel,
            attempts: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        // The request may have been cancelled while parked in the queue.
        if self.already_cancelled() {
            return;
        }

        let key = self.derive_cache_key();
        match self.descriptor.cache_policy {
            CachePolicy::None => self.network(&key, false, false).await,
            CachePolicy::NetworkOnly => self.network(&key, true, false).await,
            CachePolicy::CacheOnly => match self.read_cache(&key) {
                Some(payload) => self.complete(Ok(Delivery::cached(payload))).await,
                None => self.complete(Err(RequestError::CacheMiss)).await,
            },
            CachePolicy::CacheElseNetwork => match self.read_cache(&key) {
                Some(payload) => self.complete(Ok(Delivery::cached(payload))).await,
                None => self.network(&key, true, false).await,
            },
            CachePolicy::NetworkElseCache => self.network(&key, true, true).await,
            CachePolicy::CacheThenNetwork => {
                if let Some(payload) = self.read_cache(&key) {
                    // Non-terminal delivery; the network result follows.
                    let _ = self.tx.send(Ok(Delivery::cached(payload))).await;
                }
                self.network(&key, true, false).await
            }
        }
    }

    /// The network path: admission, then the attempt/retry/failover loop.
    async fn network(&mut self, key: &str, write_cache: bool, cache_fallback: bool) {
        let path = self.descriptor.path.clone();

        if self.descriptor.rate_limited {
            let rate_key = self
                .descriptor
                .rate_key
                .clone()
                .unwrap_or_else(|| path.clone());
            if !self.shared.limiter.should_allow(&rate_key) {
                self.complete(Err(RequestError::RateLimited { key: rate_key }))
                    .await;
                return;
            }
        }

        let breaker_key = self
            .descriptor
            .breaker_key
            .clone()
            .unwrap_or_else(|| path.clone());
        let breaker = self.shared.breakers.breaker(&breaker_key);
        if !breaker.allow_request() {
            self.complete(Err(RequestError::CircuitOpen { key: breaker_key }))
                .await;
            return;
        }

        let targets = self.targets();
        let max_retries = self
            .descriptor
            .max_retries
            .unwrap_or(self.shared.config.default_max_retries);
        let mut target_index = 0usize;
        // Retries already taken against the current target.
        let mut retries = 0usize;

        loop {
            self.attempts += 1;
            let attempt = retries + 1;
            let target = targets[target_index].clone();

            tracing::debug!(path = %path, target = %target, attempt, "starting attempt");
            self.emit(RequestEvent::AttemptStarted {
                path: path.clone(),
                target: target.clone(),
                attempt,
                timestamp: Instant::now(),
            });
            #[cfg(feature = "metrics")]
            counter!("backstop_attempts_total").increment(1);

            let error = match self.attempt(&target).await {
                Ok(response) => match self.validate(&response) {
                    Ok(()) => {
                        breaker.record_success();
                        if write_cache {
                            let max_age = self
                                .descriptor
                                .cache_max_age
                                .unwrap_or(self.shared.config.default_cache_max_age);
                            self.shared.cache.put(key, response.payload.clone(), max_age);
                        }
                        self.complete(Ok(Delivery::fresh(response.payload))).await;
                        return;
                    }
                    Err(error) => {
                        breaker.record_failure();
                        error
                    }
                },
                Err(AttemptError::Transport(e)) => {
                    breaker.record_failure();
                    RequestError::Transport(e)
                }
                Err(AttemptError::Cancelled) => return,
            };

            tracing::debug!(path = %path, attempt, error = %error, "attempt failed");
            self.emit(RequestEvent::AttemptFailed {
                path: path.clone(),
                attempt,
                error: error.clone(),
                timestamp: Instant::now(),
            });

            let (retry, delay) = match &self.descriptor.retry_policy {
                Some(policy) => (policy.should_retry(attempt, &error), policy.delay(attempt)),
                None => (retries < max_retries, self.descriptor.retry_delay),
            };
            if retry {
                retries += 1;
                self.emit(RequestEvent::RetryScheduled {
                    path: path.clone(),
                    attempt: retries,
                    delay,
                    timestamp: Instant::now(),
                });
                #[cfg(feature = "metrics")]
                counter!("backstop_retries_total").increment(1);
                if !self.sleep_unless_cancelled(delay).await {
                    return;
                }
                continue;
            }

            if self.descriptor.failover && target_index + 1 < targets.len() {
                target_index += 1;
                retries = 0;
                let next = targets[target_index].clone();
                tracing::info!(path = %path, target = %next, "failing over");
                self.emit(RequestEvent::FailedOver {
                    path: path.clone(),
                    target: next,
                    timestamp: Instant::now(),
                });
                if !self.sleep_unless_cancelled(self.descriptor.retry_delay).await {
                    return;
                }
                continue;
            }

            if cache_fallback {
                if let Some(payload) = self.read_cache(key) {
                    self.complete(Ok(Delivery::cached(payload))).await;
                    return;
                }
            }

            self.complete(Err(error)).await;
            return;
        }
    }

    /// One transport call, bounded by the effective timeout and
    /// interruptible by cancellation. Timeout expiry is an ordinary
    /// transport failure.
    async fn attempt(&mut self, target: &str) -> Result<TransportResponse, AttemptError> {
        let request = self.build_request(target);
        let timeout = request.timeout;
        let call = self.transport.clone().oneshot(request);

        tokio::select! {
            _ = &mut self.cancel => Err(AttemptError::Cancelled),
            outcome = tokio::time::timeout(timeout, call) => match outcome {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(AttemptError::Transport(e)),
                Err(_) => Err(AttemptError::Transport(TransportError::timeout())),
            },
        }
    }

    /// Waits out a retry/failover delay; false means cancellation arrived
    /// and the scheduled attempt must be discarded.
    async fn sleep_unless_cancelled(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = &mut self.cancel => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    // Cancellation is level-triggered: a dropped handle counts as cancel.
    fn already_cancelled(&mut self) -> bool {
        !matches!(
            self.cancel.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        )
    }

    fn read_cache(&self, key: &str) -> Option<Vec<u8>> {
        let entry = self.shared.cache.get(key)?;
        self.emit(RequestEvent::CacheHit {
            path: self.descriptor.path.clone(),
            key: key.to_string(),
            timestamp: Instant::now(),
        });
        #[cfg(feature = "metrics")]
        counter!("backstop_cache_hits_total").increment(1);
        Some(entry.payload)
    }

    fn validate(&self, response: &TransportResponse) -> Result<(), RequestError> {
        match &self.descriptor.validate {
            Some(predicate) if !predicate(response) => Err(RequestError::validation(
                "response rejected by validation predicate",
            )),
            _ => Ok(()),
        }
    }

    /// Terminal delivery: emits the completion event and sends the
    /// outcome. Called exactly once per request.
    async fn complete(&mut self, outcome: Result<Delivery, RequestError>) {
        let success = outcome.is_ok();
        self.emit(RequestEvent::Completed {
            path: self.descriptor.path.clone(),
            success,
            attempts: self.attempts,
            timestamp: Instant::now(),
        });
        #[cfg(feature = "metrics")]
        counter!(
            "backstop_requests_total",
            "outcome" => if success { "success" } else { "failure" }
        )
        .increment(1);
        let _ = self.tx.send(outcome).await;
    }

    fn emit(&self, event: RequestEvent) {
        self.shared.config.listeners.emit(&event);
    }

    /// Ordered target list: the override alone, or the primary followed
    /// by the backups in configured order.
    fn targets(&self) -> Vec<String> {
        if let Some(target) = &self.descriptor.target_override {
            return vec![target.clone()];
        }
        std::iter::once(self.shared.config.base_url.clone())
            .chain(self.shared.config.backup_urls.iter().cloned())
            .collect()
    }

    fn build_request(&self, target: &str) -> TransportRequest {
        TransportRequest {
            url: self.url_on(target),
            method: self.descriptor.method,
            headers: merged(
                &self.shared.config.common_headers,
                &self.descriptor.headers,
                self.descriptor.use_common_headers,
            ),
            params: merged(
                &self.shared.config.common_params,
                &self.descriptor.params,
                self.descriptor.use_common_params,
            ),
            body: self.descriptor.body.clone(),
            timeout: self
                .descriptor
                .timeout
                .unwrap_or(self.shared.config.timeout),
        }
    }

    // An absolute path bypasses the configured hosts entirely.
    fn url_on(&self, target: &str) -> String {
        let path = &self.descriptor.path;
        if path.starts_with("http://") || path.starts_with("https://") {
            path.clone()
        } else {
            format!("{target}{path}")
        }
    }

    /// The cache identity is pinned to the primary host (or the override)
    /// so an entry written after failover is still found on later
    /// requests that succeed against the primary.
    fn derive_cache_key(&self) -> String {
        let base = self
            .descriptor
            .target_override
            .as_deref()
            .unwrap_or(&self.shared.config.base_url);
        let url = self.url_on(base);
        cache_key(&url, &self.descriptor.params)
    }
}

fn merged(
    common: &BTreeMap<String, String>,
    own: &BTreeMap<String, String>,
    use_common: bool,
) -> BTreeMap<String, String> {
    if !use_common {
        return own.clone();
    }
    let mut out = common.clone();
    out.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
    out
}
