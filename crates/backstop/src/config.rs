use crate::events::RequestEvent;
use backstop_breaker::{BreakerConfig, BreakerEvent, CircuitState};
use backstop_cache::CacheStorage;
use backstop_core::{EventListeners, FnListener};
use backstop_queue::Discipline;
use backstop_ratelimit::RateRule;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Client-wide configuration consumed by the executor and registries.
///
/// Built via [`ClientConfig::builder`]; a [`crate::Client`] takes
/// ownership of it at construction.
pub struct ClientConfig {
    pub(crate) base_url: String,
    pub(crate) backup_urls: Vec<String>,
    pub(crate) timeout: Duration,
    pub(crate) max_concurrent: usize,
    pub(crate) default_max_retries: usize,
    pub(crate) default_cache_max_age: Duration,
    pub(crate) cache_capacity: usize,
    pub(crate) cache_storage: Option<Arc<dyn CacheStorage>>,
    pub(crate) breaker: BreakerConfig,
    pub(crate) rate_rule: RateRule,
    pub(crate) common_headers: BTreeMap<String, String>,
    pub(crate) common_params: BTreeMap<String, String>,
    pub(crate) discipline: Discipline,
    pub(crate) listeners: EventListeners<RequestEvent>,
    pub(crate) breaker_listeners: EventListeners<BreakerEvent>,
}

impl ClientConfig {
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn backup_urls(&self) -> &[String] {
        &self.backup_urls
    }
}

/// Builder for [`ClientConfig`].
///
/// Defaults: 30s timeout, 5 concurrent requests, no retries, cache
/// entries that never expire, a 256-entry memory tier, breaker thresholds
/// 5/2 with a 60s open timeout, and a 10-requests-per-60s rate rule.
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                base_url: base_url.into(),
                backup_urls: Vec::new(),
                timeout: Duration::from_secs(30),
                max_concurrent: 5,
                default_max_retries: 0,
                default_cache_max_age: Duration::ZERO,
                cache_capacity: 256,
                cache_storage: None,
                breaker: BreakerConfig::default(),
                rate_rule: RateRule::default(),
                common_headers: BTreeMap::new(),
                common_params: BTreeMap::new(),
                discipline: Discipline::Fifo,
                listeners: EventListeners::new(),
                breaker_listeners: EventListeners::new(),
            },
        }
    }

    /// Appends a backup host tried after retries against the primary (and
    /// any earlier backups) are exhausted.
    pub fn backup_url(mut self, url: impl Into<String>) -> Self {
        self.config.backup_urls.push(url.into());
        self
    }

    pub fn backup_urls<I, T>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.config.backup_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Default per-attempt timeout; descriptors may override it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Concurrency budget of the dispatch queue.
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.max_concurrent = max_concurrent;
        self
    }

    /// Retry count applied when a descriptor does not set its own.
    pub fn default_max_retries(mut self, max_retries: usize) -> Self {
        self.config.default_max_retries = max_retries;
        self
    }

    /// Freshness window for cache writes when a descriptor does not set
    /// its own. Zero means entries never expire.
    pub fn default_cache_max_age(mut self, max_age: Duration) -> Self {
        self.config.default_cache_max_age = max_age;
        self
    }

    /// Capacity of the in-memory cache tier, in entries.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Persistent cache tier. Defaults to process-local memory storage
    /// when unset.
    pub fn cache_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.config.cache_storage = Some(storage);
        self
    }

    /// Default thresholds for lazily created circuit breakers.
    pub fn breaker(mut self, breaker: BreakerConfig) -> Self {
        self.config.breaker = breaker;
        self
    }

    /// Default sliding-window rule for the rate limiter.
    pub fn rate_rule(mut self, rate_rule: RateRule) -> Self {
        self.config.rate_rule = rate_rule;
        self
    }

    /// Header merged into every request unless the descriptor opts out;
    /// descriptor headers win on conflict.
    pub fn common_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.common_headers.insert(key.into(), value.into());
        self
    }

    /// Parameter merged into every request unless the descriptor opts
    /// out; descriptor parameters win on conflict.
    pub fn common_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.common_params.insert(key.into(), value.into());
        self
    }

    pub fn discipline(mut self, discipline: Discipline) -> Self {
        self.config.discipline = discipline;
        self
    }

    /// Registers a listener for every request-lifecycle event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestEvent) + Send + Sync + 'static,
    {
        self.config.listeners.add(FnListener::new(f));
        self
    }

    /// Called with `(retry_number, delay)` whenever a retry is scheduled.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.config.listeners.add(FnListener::new(move |event| {
            if let RequestEvent::RetryScheduled { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Called with the next target whenever the executor fails over.
    pub fn on_failover<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.config.listeners.add(FnListener::new(move |event| {
            if let RequestEvent::FailedOver { target, .. } = event {
                f(target);
            }
        }));
        self
    }

    /// Called with `(key, from, to)` on every circuit state transition.
    pub fn on_breaker_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.config
            .breaker_listeners
            .add(FnListener::new(move |event| {
                if let BreakerEvent::StateTransition { key, from, to, .. } = event {
                    f(key, *from, *to);
                }
            }));
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = ClientConfig::builder("https://api.example.com").build();
        assert_eq!(config.base_url(), "https://api.example.com");
        assert!(config.backup_urls().is_empty());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.default_max_retries, 0);
        assert_eq!(config.default_cache_max_age, Duration::ZERO);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.rate_rule.max_requests, 10);
    }

    #[test]
    fn backup_urls_preserve_order() {
        let config = ClientConfig::builder("https://a.example.com")
            .backup_url("https://b.example.com")
            .backup_url("https://c.example.com")
            .build();
        assert_eq!(
            config.backup_urls(),
            &[
                "https://b.example.com".to_string(),
                "https://c.example.com".to_string()
            ]
        );
    }

    #[test]
    fn listener_hooks_register() {
        let config = ClientConfig::builder("https://a.example.com")
            .on_retry(|_, _| {})
            .on_failover(|_| {})
            .on_breaker_transition(|_, _, _| {})
            .build();
        assert_eq!(config.listeners.len(), 2);
        assert_eq!(config.breaker_listeners.len(), 1);
    }
}
