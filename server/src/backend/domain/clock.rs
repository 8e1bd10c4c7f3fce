//! Time source for the domain services.
//!
//! Services never call `Utc::now()` directly so that delay windows and
//! allowed-hour checks can be exercised deterministically in tests.

use chrono::{DateTime, Utc};
use std::fmt;
#[cfg(test)]
pub use manual::ManualClock;

/// Supplies the current wall-clock time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
