//! Scheduler time model.
//!
//! # Design
//!
//! Every timestamp a scheduler handles is a signed integer count of its
//! *finest time unit*:
//!
//!   normalized = finest_unit.convert(value, caller_unit)
//!
//! Integer time keeps ordering exact (no floating-point drift) and lets a
//! negative relative delay be represented, and rejected, rather than
//! silently wrapping.
//!
//! In simulated mode a scheduler's clock is the due time of the most recently
//! delivered item.  In real-time mode it is the wall clock, measured from the
//! Unix epoch in the finest unit (see [`TimeUnit::wall_clock`]).

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A point in scheduler time, in the scheduler's finest [`TimeUnit`].
///
/// Signed so that `now + delay` arithmetic and negative-delay validation stay
/// in one type.  At nanosecond resolution an `i64` covers ~292 years either
/// side of the epoch.
pub type Time = i64;

// ── TimeUnit ─────────────────────────────────────────────────────────────────

/// Granularity of a time value.
///
/// Conversions follow the usual integer rules: converting to a coarser unit
/// truncates toward zero, converting to a finer unit multiplies and saturates
/// at `i64::MIN`/`i64::MAX`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Length of one unit in nanoseconds.
    #[inline]
    pub const fn as_nanos(self) -> i64 {
        match self {
            TimeUnit::Nanoseconds  => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds      => 1_000_000_000,
            TimeUnit::Minutes      => 60 * 1_000_000_000,
            TimeUnit::Hours        => 3_600 * 1_000_000_000,
            TimeUnit::Days         => 86_400 * 1_000_000_000,
        }
    }

    /// Convert `value`, expressed in `from`, into this unit.
    ///
    /// ```
    /// use des_core::TimeUnit;
    /// assert_eq!(TimeUnit::Milliseconds.convert(3, TimeUnit::Seconds), 3_000);
    /// assert_eq!(TimeUnit::Seconds.convert(3_999, TimeUnit::Milliseconds), 3);
    /// ```
    #[inline]
    pub fn convert(self, value: i64, from: TimeUnit) -> i64 {
        let (src, dst) = (from.as_nanos(), self.as_nanos());
        if src >= dst {
            value.saturating_mul(src / dst)
        } else {
            value / (dst / src)
        }
    }

    /// `value` units as a [`Duration`].  Negative values clamp to zero.
    pub fn to_duration(self, value: i64) -> Duration {
        if value <= 0 {
            return Duration::ZERO;
        }
        let nanos = (value as u128) * (self.as_nanos() as u128);
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }

    /// Whole units contained in `duration` (truncating), saturating at `i64::MAX`.
    pub fn from_duration(self, duration: Duration) -> i64 {
        let units = duration.as_nanos() / self.as_nanos() as u128;
        units.min(i64::MAX as u128) as i64
    }

    /// Current wall-clock time since the Unix epoch, in this unit.
    ///
    /// A system clock set before the epoch reads as zero.
    pub fn wall_clock(self) -> Time {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.from_duration(since_epoch)
    }

    /// Short suffix used in log output (`"ms"`, `"s"`, …).
    pub const fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds  => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds      => "s",
            TimeUnit::Minutes      => "min",
            TimeUnit::Hours        => "h",
            TimeUnit::Days         => "d",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}
