use chrono::{DateTime, Utc};

/// Current wall-clock time as whole seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Human readable RFC 3339 rendering of a capture timestamp, for logs.
pub fn format_unix(ts: i64) -> String {
    match DateTime::<Utc>::from_timestamp(ts, 0) {
        Some(dt) => dt.to_rfc3339(),
        None => format!("{}s", ts),
    }
}
