use backstop_core::{Method, TransportResponse};
use backstop_queue::Priority;
use backstop_retry::RetryPolicy;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// When the cache is read or written relative to the network attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Skip the cache entirely.
    #[default]
    None,
    /// Serve from cache or fail with `CacheMiss`; never touch the network.
    CacheOnly,
    /// Always hit the network; write the result to cache on success.
    NetworkOnly,
    /// Serve a valid cache entry if present, else hit the network and
    /// cache the result.
    CacheElseNetwork,
    /// Hit the network; if it fails terminally, fall back to the cache.
    NetworkElseCache,
    /// Deliver a valid cache entry immediately (non-terminal), then always
    /// hit the network and deliver the fresh result too. The only policy
    /// that delivers twice.
    CacheThenNetwork,
}

/// Validation predicate applied to successful transport responses.
pub type ValidateFn = Arc<dyn Fn(&TransportResponse) -> bool + Send + Sync>;

/// Immutable description of one logical request.
///
/// Built once via [`RequestDescriptor::builder`] and never mutated; the
/// executor keeps its own per-attempt state separately.
#[derive(Clone)]
pub struct RequestDescriptor {
    pub(crate) path: String,
    pub(crate) method: Method,
    pub(crate) params: BTreeMap<String, String>,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) cache_policy: CachePolicy,
    pub(crate) cache_max_age: Option<Duration>,
    pub(crate) max_retries: Option<usize>,
    pub(crate) retry_delay: Duration,
    pub(crate) retry_policy: Option<Arc<dyn RetryPolicy>>,
    pub(crate) priority: Priority,
    pub(crate) timeout: Option<Duration>,
    pub(crate) target_override: Option<String>,
    pub(crate) failover: bool,
    pub(crate) rate_limited: bool,
    pub(crate) breaker_key: Option<String>,
    pub(crate) rate_key: Option<String>,
    pub(crate) validate: Option<ValidateFn>,
    pub(crate) use_common_params: bool,
    pub(crate) use_common_headers: bool,
}

impl RequestDescriptor {
    pub fn builder(path: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::new(path)
    }

    /// Shorthand for a GET descriptor builder.
    pub fn get(path: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(path).method(Method::Get)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("cache_policy", &self.cache_policy)
            .field("priority", &self.priority)
            .field("max_retries", &self.max_retries)
            .field("failover", &self.failover)
            .field("target_override", &self.target_override)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestDescriptor`].
pub struct RequestDescriptorBuilder {
    descriptor: RequestDescriptor,
}

impl RequestDescriptorBuilder {
    fn new(path: impl Into<String>) -> Self {
        Self {
            descriptor: RequestDescriptor {
                path: path.into(),
                method: Method::Get,
                params: BTreeMap::new(),
                headers: BTreeMap::new(),
                body: None,
                cache_policy: CachePolicy::None,
                cache_max_age: None,
                max_retries: None,
                retry_delay: Duration::from_secs(1),
                retry_policy: None,
                priority: Priority::Normal,
                timeout: None,
                target_override: None,
                failover: true,
                rate_limited: true,
                breaker_key: None,
                rate_key: None,
                validate: None,
                use_common_params: true,
                use_common_headers: true,
            },
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.descriptor.method = method;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor.params.insert(key.into(), value.into());
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.descriptor
            .params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.descriptor.body = Some(body.into());
        self
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.descriptor.cache_policy = policy;
        self
    }

    /// Freshness window for entries this request writes. Zero means the
    /// entry never expires; unset falls back to the client default.
    pub fn cache_max_age(mut self, max_age: Duration) -> Self {
        self.descriptor.cache_max_age = Some(max_age);
        self
    }

    /// Retries against each target before failing over. Unset falls back
    /// to the client default.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.descriptor.max_retries = Some(max_retries);
        self
    }

    /// Delay between attempts on the simple fixed-count retry path, and
    /// before switching targets on failover.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.descriptor.retry_delay = delay;
        self
    }

    /// Selects a retry policy; when set it replaces the fixed-count
    /// retry decision (failover still applies afterwards).
    pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.descriptor.retry_policy = Some(policy);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.descriptor.priority = priority;
        self
    }

    /// Per-request timeout override.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.descriptor.timeout = Some(timeout);
        self
    }

    /// Pins the request to one host, disabling failover.
    pub fn target_override(mut self, target: impl Into<String>) -> Self {
        self.descriptor.target_override = Some(target.into());
        self
    }

    /// Whether exhausted retries advance to the backup hosts.
    pub fn failover(mut self, failover: bool) -> Self {
        self.descriptor.failover = failover;
        self
    }

    /// Whether the rate limiter gates this request.
    pub fn rate_limited(mut self, rate_limited: bool) -> Self {
        self.descriptor.rate_limited = rate_limited;
        self
    }

    /// Circuit-breaker key; defaults to the request path.
    pub fn breaker_key(mut self, key: impl Into<String>) -> Self {
        self.descriptor.breaker_key = Some(key.into());
        self
    }

    /// Rate-limiter key; defaults to the request path.
    pub fn rate_key(mut self, key: impl Into<String>) -> Self {
        self.descriptor.rate_key = Some(key.into());
        self
    }

    /// Predicate a successful transport response must pass. A rejected
    /// payload is treated as a failure and consumes retry/failover budget
    /// like any transport error.
    pub fn validate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TransportResponse) -> bool + Send + Sync + 'static,
    {
        self.descriptor.validate = Some(Arc::new(predicate));
        self
    }

    pub fn use_common_params(mut self, use_common: bool) -> Self {
        self.descriptor.use_common_params = use_common;
        self
    }

    pub fn use_common_headers(mut self, use_common: bool) -> Self {
        self.descriptor.use_common_headers = use_common;
        self
    }

    pub fn build(self) -> RequestDescriptor {
        self.descriptor
    }
}
