use crate::circuit::{BreakerConfig, CircuitBreaker};
use crate::events::BreakerEvent;
use backstop_core::EventListeners;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Owns one lazily created breaker per key.
///
/// The registry is a plain value: each client composes its own, so breaker
/// state never leaks between clients or between tests.
pub struct BreakerRegistry {
    default_config: BreakerConfig,
    listeners: EventListeners<BreakerEvent>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(default_config: BreakerConfig) -> Self {
        Self::with_listeners(default_config, EventListeners::new())
    }

    pub fn with_listeners(
        default_config: BreakerConfig,
        listeners: EventListeners<BreakerEvent>,
    ) -> Self {
        Self {
            default_config,
            listeners,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the breaker for `key`, creating it from the default config
    /// on first use.
    pub fn breaker(&self, key: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap();
        Arc::clone(breakers.entry(key.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::with_listeners(
                key,
                self.default_config.clone(),
                self.listeners.clone(),
            ))
        }))
    }

    /// Drops the breaker for `key`; a subsequent lookup starts fresh.
    pub fn remove(&self, key: &str) {
        self.breakers.lock().unwrap().remove(key);
    }

    /// Resets every breaker to `Closed`.
    pub fn reset_all(&self) {
        let breakers = self.breakers.lock().unwrap();
        for breaker in breakers.values() {
            breaker.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitState;
    use std::time::Duration;

    fn config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            open_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn same_key_same_breaker() {
        let registry = BreakerRegistry::new(config());
        let a = registry.breaker("/users");
        let b = registry.breaker("/users");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn keys_are_isolated() {
        let registry = BreakerRegistry::new(config());
        let users = registry.breaker("/users");
        users.record_failure();
        users.record_failure();
        assert_eq!(users.state(), CircuitState::Open);

        let orders = registry.breaker("/orders");
        assert_eq!(orders.state(), CircuitState::Closed);
    }

    #[test]
    fn remove_discards_state() {
        let registry = BreakerRegistry::new(config());
        let breaker = registry.breaker("/users");
        breaker.record_failure();
        breaker.record_failure();
        registry.remove("/users");

        assert_eq!(registry.breaker("/users").state(), CircuitState::Closed);
    }

    #[test]
    fn reset_all_closes_everything() {
        let registry = BreakerRegistry::new(config());
        for key in ["/a", "/b"] {
            let breaker = registry.breaker(key);
            breaker.record_failure();
            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Open);
        }

        registry.reset_all();
        assert_eq!(registry.breaker("/a").state(), CircuitState::Closed);
        assert_eq!(registry.breaker("/b").state(), CircuitState::Closed);
    }
}
