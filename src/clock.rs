//! Injectable wall-clock time source.
//!
//! Every TTL decision in the crate asks a [`Clock`] for "now" instead of
//! reading the system time directly, so expiry can be driven deterministically
//! in tests with [`FakeClock`].

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};

/// Abstracts the system time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Clone)]
pub struct FakeClock {
    t: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::new_set(Utc::now())
    }

    pub fn new_set(t: DateTime<Utc>) -> Self {
        Self {
            t: Arc::new(Mutex::new(t)),
        }
    }

    /// Move the clock to `t`. Time never goes backwards.
    pub fn set(&self, t: DateTime<Utc>) {
        let mut current = self.t.lock().unwrap_or_else(|e| e.into_inner());
        assert!(
            *current <= t,
            "The previous time [{}] is more than new time [{t}]",
            *current
        );
        *current = t;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let next = self.now() + delta;
        self.set(next);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.t.lock().unwrap_or_else(|e| e.into_inner())
    }
}
