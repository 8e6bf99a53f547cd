//! Clock abstraction for deterministic timestamps.

use chrono::{DateTime, Utc};

/// Source of "now" for freshly created events.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Delegates to the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. Useful in tests and deterministic replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
