//! Timestamp handling.
//!
//! The engine works on plain unix seconds internally: scanning compares
//! millions of times and the window arithmetic of the connection store
//! needs integer division. `chrono` types are only used at the API edge.

use chrono::{DateTime, TimeZone, Utc};

/// Seconds since the unix epoch (UTC).
pub type Time = u64;

/// Error returned when a timestamp cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("timestamp out of range: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

/// Converts a UTC datetime into unix seconds.
///
/// Datetimes before the epoch are rejected.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use transit_planner::domain::to_unix;
///
/// let dt = Utc.with_ymd_and_hms(2018, 12, 4, 9, 30, 0).unwrap();
/// assert_eq!(to_unix(dt).unwrap(), 1_543_915_800);
/// ```
pub fn to_unix(datetime: DateTime<Utc>) -> Result<Time, TimeError> {
    u64::try_from(datetime.timestamp()).map_err(|_| TimeError {
        reason: "before unix epoch",
    })
}

/// Converts unix seconds back into a UTC datetime.
pub fn from_unix(time: Time) -> Result<DateTime<Utc>, TimeError> {
    let secs = i64::try_from(time).map_err(|_| TimeError {
        reason: "exceeds i64 seconds",
    })?;
    Utc.timestamp_opt(secs, 0).single().ok_or(TimeError {
        reason: "not representable as a datetime",
    })
}

/// Absolute difference between two timestamps, in seconds.
pub fn seconds_between(a: Time, b: Time) -> u64 {
    a.abs_diff(b)
}
