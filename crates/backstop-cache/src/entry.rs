use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// One cached result with its freshness window.
///
/// `max_age` of zero means the entry never expires. Wall-clock time is
/// used (not a monotonic clock) because entries survive process restarts
/// on the persistent tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: Vec<u8>,
    pub created_at: SystemTime,
    pub max_age: Duration,
}

impl CacheEntry {
    pub fn new(payload: Vec<u8>, max_age: Duration) -> Self {
        Self {
            payload,
            created_at: SystemTime::now(),
            max_age,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(SystemTime::now())
    }

    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        if self.max_age.is_zero() {
            return true;
        }
        match now.duration_since(self.created_at) {
            Ok(age) => age < self.max_age,
            // Clock went backwards; the entry is younger than it claims.
            Err(_) => true,
        }
    }
}
