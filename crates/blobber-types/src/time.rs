use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};

/// Ledger-style timestamp: whole seconds since the UNIX epoch.
///
/// Write markers and allocation expirations use this form because it is
/// what the ledger signs and stores.
pub type Timestamp = i64;

/// The current wall-clock time in seconds.
pub fn now_seconds() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as Timestamp
}

/// Wire form of a record timestamp: signed nanoseconds since the epoch.
///
/// Instants outside the representable range (before 1677 or after 2262)
/// saturate to 0.
pub fn to_unix_nanos(at: &DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap_or_default()
}

/// Inverse of [`to_unix_nanos`]. Total over every `i64`.
pub fn from_unix_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}
