use crate::events::BreakerEvent;
use backstop_core::EventListeners;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// State of one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass; consecutive failures are counted.
    Closed,
    /// Requests are rejected immediately.
    Open,
    /// Probe requests pass while the backend is tested for recovery.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Thresholds driving the three-state machine.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures in `Closed` that open the circuit.
    pub failure_threshold: u32,
    /// Probe successes in `HalfOpen` that close the circuit.
    pub success_threshold: u32,
    /// How long an open circuit rejects before permitting a probe.
    pub open_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of a breaker's internals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_successes: u32,
}

struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            last_failure_at: None,
            opened_at: None,
        }
    }
}

/// A single circuit breaker, safe to share across tasks.
///
/// All transitions happen under one mutex, so outcome recording is
/// idempotent under the non-deterministic completion order of concurrent
/// requests: the second of two near-simultaneous half-open failures lands
/// in `Open` and is a no-op.
pub struct CircuitBreaker {
    key: String,
    config: BreakerConfig,
    inner: Mutex<Circuit>,
    listeners: EventListeners<BreakerEvent>,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_listeners(key, config, EventListeners::new())
    }

    pub(crate) fn with_listeners(
        key: impl Into<String>,
        config: BreakerConfig,
        listeners: EventListeners<BreakerEvent>,
    ) -> Self {
        Self {
            key: key.into(),
            config,
            inner: Mutex::new(Circuit::new()),
            listeners,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a request may proceed right now.
    ///
    /// An open circuit whose timeout has elapsed transitions to `HalfOpen`
    /// and permits the call as a probe.
    pub fn allow_request(&self) -> bool {
        let mut circuit = self.inner.lock().unwrap();
        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = circuit
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.open_timeout)
                    .unwrap_or(true);
                if elapsed {
                    self.transition(&mut circuit, CircuitState::HalfOpen);
                    true
                } else {
                    self.listeners.emit(&BreakerEvent::CallRejected {
                        key: self.key.clone(),
                        timestamp: Instant::now(),
                    });
                    #[cfg(feature = "metrics")]
                    counter!("breaker_calls_rejected_total", "breaker" => self.key.clone())
                        .increment(1);
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut circuit = self.inner.lock().unwrap();
        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                circuit.half_open_successes += 1;
                if circuit.half_open_successes >= self.config.success_threshold {
                    self.transition(&mut circuit, CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut circuit = self.inner.lock().unwrap();
        circuit.last_failure_at = Some(Instant::now());
        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut circuit, CircuitState::Open);
                }
            }
            // One probe failure is enough to re-open.
            CircuitState::HalfOpen => {
                self.transition(&mut circuit, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let circuit = self.inner.lock().unwrap();
        BreakerSnapshot {
            state: circuit.state,
            consecutive_failures: circuit.consecutive_failures,
            half_open_successes: circuit.half_open_successes,
        }
    }

    /// Returns the circuit to `Closed` and clears all bookkeeping.
    pub fn reset(&self) {
        let mut circuit = self.inner.lock().unwrap();
        self.transition(&mut circuit, CircuitState::Closed);
        circuit.last_failure_at = None;
        circuit.opened_at = None;
    }

    // Counters reset on every transition.
    fn transition(&self, circuit: &mut Circuit, to: CircuitState) {
        if circuit.state == to {
            return;
        }
        let from = circuit.state;
        circuit.state = to;
        circuit.consecutive_failures = 0;
        circuit.half_open_successes = 0;
        if to == CircuitState::Open {
            circuit.opened_at = Some(Instant::now());
        }

        tracing::info!(
            breaker = %self.key,
            from = from.as_str(),
            to = to.as_str(),
            "circuit state transition"
        );
        self.listeners.emit(&BreakerEvent::StateTransition {
            key: self.key.clone(),
            from,
            to,
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        counter!(
            "breaker_transitions_total",
            "breaker" => self.key.clone(),
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
    }
}
