//! Shared database time conversion helpers.
//!
//! Dates are stored as floating point milliseconds since the unix epoch.

use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn to_millis(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64
}

/// Out-of-range values clamp to the epoch.
pub(crate) fn from_millis(millis: f64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .unwrap_or_default()
}

pub(crate) fn now_millis() -> f64 {
    to_millis(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_roundtrip_keeps_millisecond_precision() {
        let at = Utc
            .timestamp_millis_opt(1_700_000_000_123)
            .single()
            .expect("valid");
        assert_eq!(to_millis(at), 1_700_000_000_123.0);
        assert_eq!(from_millis(to_millis(at)), at);
        assert_eq!(from_millis(f64::NAN), DateTime::<Utc>::default());
    }
}
