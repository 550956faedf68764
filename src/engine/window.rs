use chrono::{NaiveTime, Timelike};

use crate::error::Error;

pub const MINUTES_PER_DAY: i64 = 1440;

/// Minutes since midnight for a time-of-day. Seconds are truncated into the
/// minute, matching `h*60 + m + s/60` in integer arithmetic.
pub fn time_to_minutes(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight()) / 60
}

/// Parses an `"HH:MM:SS"` string into minutes since midnight.
pub fn parse_time_minutes(s: &str) -> Result<i64, Error> {
    let t = NaiveTime::parse_from_str(s, "%H:%M:%S")
        .map_err(|_| Error::InvalidTime(s.to_string()))?;
    Ok(time_to_minutes(t))
}

/// A shift's expected working window in comparable minute offsets.
///
/// All times are deployment-local civil time; nothing here reads the system
/// clock or timezone. An overnight shift (end numerically at or before start)
/// has its end rolled forward by one day, so `end_min` may exceed 1440.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftWindow {
    pub start_min: i64,
    pub end_min: i64,
    pub grace_min: i64,
}

impl ShiftWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, grace_min: i64) -> Self {
        Self::from_minutes(time_to_minutes(start), time_to_minutes(end), grace_min)
    }

    pub fn from_minutes(start_min: i64, end_min: i64, grace_min: i64) -> Self {
        let end_min = if end_min <= start_min {
            end_min + MINUTES_PER_DAY
        } else {
            end_min
        };
        Self {
            start_min,
            end_min,
            grace_min,
        }
    }

    pub fn from_strs(start: &str, end: &str, grace_min: i64) -> Result<Self, Error> {
        Ok(Self::from_minutes(
            parse_time_minutes(start)?,
            parse_time_minutes(end)?,
            grace_min,
        ))
    }

    pub fn duration_min(&self) -> i64 {
        self.end_min - self.start_min
    }

    /// Last minute offset at which an unmarked day is still not ABSENT.
    pub fn end_with_grace(&self) -> i64 {
        self.end_min + self.grace_min
    }
}

/// Minutes between check-in and check-out, rolling forward one day when the
/// pair crosses midnight. Floored at 1 so a degenerate same-minute pair still
/// records a worked session.
pub fn worked_minutes(check_in: NaiveTime, check_out: NaiveTime) -> i64 {
    let mut diff = time_to_minutes(check_out) - time_to_minutes(check_in);
    if diff < 0 {
        diff += MINUTES_PER_DAY;
    }
    diff.max(1)
}
