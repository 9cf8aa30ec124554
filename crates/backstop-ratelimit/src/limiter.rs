use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How many requests a key may make within a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRule {
    pub window: Duration,
    pub max_requests: usize,
}

impl Default for RateRule {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 10,
        }
    }
}

struct LimiterState {
    rules: HashMap<String, RateRule>,
    windows: HashMap<String, VecDeque<Instant>>,
}

/// Per-key sliding-window admission counter.
///
/// Each key keeps the timestamps of its admitted requests; entries older
/// than the window are pruned lazily on every admission check, so the
/// stored sequence only ever contains timestamps within `now - window`.
pub struct SlidingWindowLimiter {
    default_rule: RateRule,
    state: Mutex<LimiterState>,
}

impl SlidingWindowLimiter {
    pub fn new(default_rule: RateRule) -> Self {
        Self {
            default_rule,
            state: Mutex::new(LimiterState {
                rules: HashMap::new(),
                windows: HashMap::new(),
            }),
        }
    }

    /// Overrides the rule for one key; other keys keep the default.
    pub fn set_rule(&self, key: impl Into<String>, rule: RateRule) {
        self.state.lock().unwrap().rules.insert(key.into(), rule);
    }

    pub fn rule_for(&self, key: &str) -> RateRule {
        self.state
            .lock()
            .unwrap()
            .rules
            .get(key)
            .copied()
            .unwrap_or(self.default_rule)
    }

    /// Admits and records the request, or rejects it.
    ///
    /// A rejected request is not recorded, so it does not extend the
    /// window it was rejected from.
    pub fn should_allow(&self, key: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let rule = state.rules.get(key).copied().unwrap_or(self.default_rule);
        let now = Instant::now();

        let window = state.windows.entry(key.to_string()).or_default();
        while let Some(front) = window.front() {
            if now.duration_since(*front) >= rule.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= rule.max_requests {
            tracing::warn!(key, limit = rule.max_requests, "rate limit exceeded");
            return false;
        }
        window.push_back(now);
        true
    }

    /// Number of admitted requests currently inside `key`'s window.
    pub fn in_window(&self, key: &str) -> usize {
        let mut state = self.state.lock().unwrap();
        let rule = state.rules.get(key).copied().unwrap_or(self.default_rule);
        let now = Instant::now();
        match state.windows.get_mut(key) {
            Some(window) => {
                while let Some(front) = window.front() {
                    if now.duration_since(*front) >= rule.window {
                        window.pop_front();
                    } else {
                        break;
                    }
                }
                window.len()
            }
            None => 0,
        }
    }

    /// Forgets the recorded requests for one key.
    pub fn clear(&self, key: &str) {
        self.state.lock().unwrap().windows.remove(key);
    }

    /// Forgets all recorded requests.
    pub fn clear_all(&self) {
        self.state.lock().unwrap().windows.clear();
    }
}
