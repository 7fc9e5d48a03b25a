//! Wire timestamp helpers.
//!
//! All envelope expiry and validity fields travel as unix seconds. In
//! memory the SDK works with UTC datetimes and converts at the wire
//! boundary.

use chrono::{DateTime, TimeZone, Utc};

/// UTC timestamp used throughout the SDK.
pub type Timestamp = DateTime<Utc>;

/// The current UTC time.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert to the wire form (unix seconds).
pub fn to_unix(ts: Timestamp) -> i64 {
    ts.timestamp()
}

/// Convert from the wire form, clamping out-of-range values.
pub fn from_unix(secs: i64) -> Timestamp {
    match Utc.timestamp_opt(secs, 0) {
        chrono::LocalResult::Single(ts) => ts,
        _ => DateTime::<Utc>::MIN_UTC,
    }
}
