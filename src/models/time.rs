//! Tick-based time values.
//!
//! Dates are absolute tick counts: 100 ns units since 0001-01-01 00:00 UTC.
//! The minimum date doubles as the "unset" sentinel, so a nullable date is a
//! plain [`Timestamp`] compared against [`Timestamp::UNSET`] rather than an
//! `Option`. This keeps the persisted layout fixed-width.
//!
//! Durations are [`TimeSpan`] tick counts and may be negative (for deltas).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Ticks per millisecond.
pub const TICKS_PER_MILLISECOND: i64 = 10_000;
/// Ticks per second.
pub const TICKS_PER_SECOND: i64 = 1_000 * TICKS_PER_MILLISECOND;
/// Ticks per minute.
pub const TICKS_PER_MINUTE: i64 = 60 * TICKS_PER_SECOND;
/// Ticks per hour.
pub const TICKS_PER_HOUR: i64 = 60 * TICKS_PER_MINUTE;
/// Ticks per day.
pub const TICKS_PER_DAY: i64 = 24 * TICKS_PER_HOUR;

/// Ticks at 1970-01-01 00:00 UTC.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

// ================================
// Timestamp
// ================================

/// An absolute point in time, or the unset sentinel.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The minimum date, used as "no value".
    pub const UNSET: Self = Self(0);

    /// Wraps a raw tick count.
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Raw tick count.
    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Whether this holds a real date.
    #[inline]
    pub const fn is_set(self) -> bool {
        self.0 > Self::UNSET.0
    }

    /// Returns `self` when set, otherwise `fallback`.
    pub fn or(self, fallback: Timestamp) -> Timestamp {
        if self.is_set() {
            self
        } else {
            fallback
        }
    }

    /// Converts a UTC date-time to ticks.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let secs = dt.timestamp();
        let sub_ticks = i64::from(dt.timestamp_subsec_nanos()) / 100;
        Self(UNIX_EPOCH_TICKS + secs * TICKS_PER_SECOND + sub_ticks)
    }

    /// Converts to a UTC date-time. `None` when unset or out of range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if !self.is_set() {
            return None;
        }
        let since_epoch = self.0 - UNIX_EPOCH_TICKS;
        let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
        let nanos = (since_epoch.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            None if !self.is_set() => f.write_str("unset"),
            None => write!(f, "{} ticks", self.0),
        }
    }
}

impl Add<TimeSpan> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: TimeSpan) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.0))
    }
}

impl Sub<TimeSpan> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: TimeSpan) -> Timestamp {
        Timestamp(self.0.saturating_sub(rhs.0))
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = TimeSpan;

    fn sub(self, rhs: Timestamp) -> TimeSpan {
        TimeSpan(self.0.saturating_sub(rhs.0))
    }
}

// ================================
// TimeSpan
// ================================

/// A duration in ticks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeSpan(i64);

impl TimeSpan {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw tick count.
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Whole minutes.
    pub const fn from_minutes(minutes: i64) -> Self {
        Self(minutes * TICKS_PER_MINUTE)
    }

    /// Whole hours.
    pub const fn from_hours(hours: i64) -> Self {
        Self(hours * TICKS_PER_HOUR)
    }

    /// Whole days.
    pub const fn from_days(days: i64) -> Self {
        Self(days * TICKS_PER_DAY)
    }

    /// Raw tick count.
    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Whether the span is strictly positive.
    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Whether the span is negative.
    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Length in (fractional) hours.
    pub fn hours(self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(TICKS_PER_HOUR)
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.hours().round_dp(2).normalize())
    }
}

impl Add for TimeSpan {
    type Output = TimeSpan;

    fn add(self, rhs: TimeSpan) -> TimeSpan {
        TimeSpan(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for TimeSpan {
    fn add_assign(&mut self, rhs: TimeSpan) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for TimeSpan {
    type Output = TimeSpan;

    fn sub(self, rhs: TimeSpan) -> TimeSpan {
        TimeSpan(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for TimeSpan {
    fn sub_assign(&mut self, rhs: TimeSpan) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Neg for TimeSpan {
    type Output = TimeSpan;

    fn neg(self) -> TimeSpan {
        TimeSpan(self.0.saturating_neg())
    }
}
