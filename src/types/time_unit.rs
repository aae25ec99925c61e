//! Time unit conversion for `SimulationInfo`, which interprets `max_time`
//! and schedule timestamps in a configurable unit rather than always
//! seconds.

use super::RealTime;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unit a scenario's timestamps are expressed in before being normalized to
/// [`RealTime`] seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimeUnit {
    /// Seconds (the identity conversion).
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
    /// 365-day years.
    Years,
}

impl TimeUnit {
    /// Number of seconds in one unit of `self`.
    pub const fn seconds_per_unit(self) -> RealTime {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3_600,
            TimeUnit::Days => 86_400,
            TimeUnit::Years => 86_400 * 365,
        }
    }

    /// Convert a duration expressed in `self` into seconds.
    pub const fn to_seconds(self, value: RealTime) -> RealTime {
        value * self.seconds_per_unit()
    }

    /// Convert a duration in seconds back into `self`'s unit (truncating).
    pub const fn from_seconds(self, seconds: RealTime) -> RealTime {
        seconds / self.seconds_per_unit()
    }
}

impl Default for TimeUnit {
    fn default() -> Self {
        TimeUnit::Seconds
    }
}
