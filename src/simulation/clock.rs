//! Wall-clock access for the simulation
//!
//! Fallback identities, synthesized client IDs and run timestamps all read the
//! time through a [`Clock`] so tests can pin it.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::sync::Arc;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time
    fn now(&self) -> DateTime<Utc>;

    /// Current unix time in whole seconds
    fn unix_seconds(&self) -> u64 {
        self.now().timestamp().max(0) as u64
    }

    /// Current unix time in milliseconds
    fn unix_millis(&self) -> u64 {
        self.now().timestamp_millis().max(0) as u64
    }
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    /// Freeze at the given instant
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Freeze at a unix timestamp given in milliseconds
    pub fn from_unix_millis(millis: i64) -> Self {
        Self(Utc.timestamp_millis_opt(millis).single().unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_components() {
        let clock = FixedClock::from_unix_millis(1_712_345_678_901);
        assert_eq!(clock.unix_seconds(), 1_712_345_678);
        assert_eq!(clock.unix_millis(), 1_712_345_678_901);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.unix_seconds() > 1_577_836_800);
    }
}
