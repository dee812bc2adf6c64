use chrono::{DateTime, Utc};

/// Convert a timestamp to epoch milliseconds, the store's time representation.
pub fn to_epoch_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert epoch milliseconds back to a timestamp.
pub fn from_epoch_millis(millis: i64) -> DateTime<Utc> {
    // Out-of-range values fall back to 1970-01-01
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
