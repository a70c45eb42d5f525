//! Local time of a place, derived from its UTC offset in seconds.

use chrono::{DateTime, Duration, Utc};

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local timestamp plus a coarse `UTC±H` zone label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTime {
    pub local_time: String,
    pub timezone_label: String,
}

/// Computes the local time for `offset_secs` at the current instant.
pub fn local_time_now(offset_secs: i64) -> LocalTime {
    local_time_at(offset_secs, Utc::now())
}

pub fn local_time_at(offset_secs: i64, now: DateTime<Utc>) -> LocalTime {
    let local = now + Duration::seconds(offset_secs);

    LocalTime {
        local_time: local.format(LOCAL_TIME_FORMAT).to_string(),
        timezone_label: timezone_label(offset_secs),
    }
}

/// `UTC` followed by the signed whole hours of the offset.
///
/// Hours are truncated toward zero, so half-hour zones lose their minutes
/// (19800 s renders as `UTC+5`).
pub fn timezone_label(offset_secs: i64) -> String {
    format!("UTC{:+}", offset_secs / 3600)
}
