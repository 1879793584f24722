use chrono::{DateTime, TimeZone, Utc};

/// Offset in seconds between the Windows epoch (1601-01-01) and the Unix
/// epoch (1970-01-01) — shared by FILETIME and WebKit decoding (spec §4.1).
const WINDOWS_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// Decodes a Windows FILETIME (100-ns ticks since 1601-01-01) into UTC.
pub fn filetime_to_datetime(filetime: i64) -> Option<DateTime<Utc>> {
    let unix_100ns = filetime - WINDOWS_EPOCH_OFFSET_SECS * 10_000_000;
    let unix_micros = unix_100ns / 10;
    datetime_from_unix_micros(unix_micros)
}

/// Decodes a WebKit timestamp (µs since 1601-01-01) into UTC.
pub fn webkit_to_datetime(webkit: i64) -> Option<DateTime<Utc>> {
    let unix_micros = webkit - WINDOWS_EPOCH_OFFSET_SECS * 1_000_000;
    datetime_from_unix_micros(unix_micros)
}

fn datetime_from_unix_micros(unix_micros: i64) -> Option<DateTime<Utc>> {
    let secs = unix_micros.div_euclid(1_000_000);
    let micros = unix_micros.rem_euclid(1_000_000);
    Utc.timestamp_opt(secs, (micros * 1000) as u32).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filetime_epoch_decodes_to_windows_epoch() {
        let dt = filetime_to_datetime(0).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "1601-01-01");
    }

    #[test]
    fn webkit_epoch_decodes_to_windows_epoch() {
        let dt = webkit_to_datetime(0).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "1601-01-01");
    }

    #[test]
    fn filetime_known_value_matches_unix_time() {
        // 2026-01-15T10:30:00Z in 100-ns FILETIME ticks.
        let unix_secs: i64 = DateTime::parse_from_rfc3339("2026-01-15T10:30:00Z").unwrap().timestamp();
        let filetime = (unix_secs + WINDOWS_EPOCH_OFFSET_SECS) * 10_000_000;
        let dt = filetime_to_datetime(filetime).unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-01-15T10:30:00+00:00");
    }
}
