//! Identity and time types shared across the Learnify crates

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Milliseconds since the Unix epoch, the unit used by persisted envelopes.
pub fn to_epoch_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

/// Convert epoch milliseconds back into a [`Timestamp`].
///
/// Out-of-range values clamp to the Unix epoch rather than failing.
pub fn from_epoch_millis(millis: i64) -> Timestamp {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
