use crate::circuit::CircuitState;
use backstop_core::ClientEvent;
use std::time::Instant;

/// Observable breaker activity.
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    /// The circuit moved between states. Counters were reset as part of
    /// the transition.
    StateTransition {
        key: String,
        from: CircuitState,
        to: CircuitState,
        timestamp: Instant,
    },
    /// A request was rejected because the circuit is open.
    CallRejected { key: String, timestamp: Instant },
}

impl ClientEvent for BreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BreakerEvent::StateTransition { .. } => "state_transition",
            BreakerEvent::CallRejected { .. } => "call_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BreakerEvent::StateTransition { timestamp, .. }
            | BreakerEvent::CallRejected { timestamp, .. } => *timestamp,
        }
    }
}
