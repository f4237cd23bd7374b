use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use tracing::warn;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Uses the `iana-time-zone` crate directly – no subprocess calls.
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name.parse::<Tz>().is_ok()
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Naive layouts accepted in the `timestamp` column, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parses log timestamps into wall-clock time of one display timezone.
///
/// Naive values are taken as already being in the display timezone.
/// Values carrying an offset (RFC 3339) are converted into it.
pub struct TimezoneHandler {
    display_tz: Tz,
}

impl TimezoneHandler {
    /// Create a handler for `tz_name`.
    ///
    /// `"auto"` resolves to the system timezone. Unrecognised names fall
    /// back to UTC and log a warning.
    pub fn new(tz_name: &str) -> Self {
        let resolved = if tz_name == "auto" {
            get_system_timezone()
        } else {
            tz_name.to_string()
        };
        if !validate_timezone(&resolved) {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                resolved
            );
        }
        let tz = resolved.parse::<Tz>().unwrap_or(Tz::UTC);
        Self { display_tz: tz }
    }

    /// Parse a timestamp string. Returns `None` for empty or unrecognised input.
    pub fn parse_timestamp(&self, s: &str) -> Option<NaiveDateTime> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        // Replace trailing 'Z' with '+00:00'.
        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&self.display_tz).naive_local());
        }
        // Space-separated date and time with an offset.
        if let Ok(dt) = DateTime::parse_from_str(&normalised, "%Y-%m-%d %H:%M:%S%.f%:z") {
            return Some(dt.with_timezone(&self.display_tz).naive_local());
        }

        for fmt in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(naive);
            }
        }

        parse_date(s).map(|d| d.and_time(NaiveTime::MIN))
    }

    pub fn display_tz(&self) -> Tz {
        self.display_tz
    }
}

/// Parse a `YYYY-MM-DD` (or `MM/DD/YYYY`) calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_validate_timezone() {
        assert!(validate_timezone("UTC"));
        assert!(validate_timezone("America/Los_Angeles"));
        assert!(!validate_timezone("Mars/Olympus_Mons"));
    }

    #[test]
    fn test_handler_invalid_timezone_falls_back_to_utc() {
        let handler = TimezoneHandler::new("Not/AZone");
        assert_eq!(handler.display_tz(), Tz::UTC);
    }

    #[test]
    fn test_parse_timestamp_iso_naive() {
        let handler = TimezoneHandler::new("UTC");
        let dt = handler.parse_timestamp("2024-01-15T10:30:00").unwrap();
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_timestamp_space_separated_with_fraction() {
        let handler = TimezoneHandler::new("UTC");
        let dt = handler.parse_timestamp("2024-01-15 10:30:00.250").unwrap();
        assert_eq!(dt.second(), 0);
        assert_eq!(dt.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_parse_timestamp_minutes_only() {
        let handler = TimezoneHandler::new("UTC");
        let dt = handler.parse_timestamp("2024-01-01T09:00").unwrap();
        assert_eq!(dt.hour(), 9);
    }

    #[test]
    fn test_parse_timestamp_us_layout() {
        let handler = TimezoneHandler::new("UTC");
        let dt = handler.parse_timestamp("03/07/2024 17:45").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(dt.hour(), 17);
    }

    #[test]
    fn test_parse_timestamp_z_suffix() {
        let handler = TimezoneHandler::new("UTC");
        let dt = handler.parse_timestamp("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_timestamp_offset_converted_to_display_tz() {
        let handler = TimezoneHandler::new("UTC");
        // 12:00 +02:00 = 10:00 UTC
        let dt = handler.parse_timestamp("2024-01-15T12:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 10);

        let ny = TimezoneHandler::new("America/New_York");
        // 15:00 UTC = 10:00 EST
        let dt = ny.parse_timestamp("2024-01-15T15:00:00Z").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_timestamp_naive_not_shifted_by_display_tz() {
        let handler = TimezoneHandler::new("Asia/Tokyo");
        let dt = handler.parse_timestamp("2024-01-15 08:00:00").unwrap();
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_parse_timestamp_date_only_is_midnight() {
        let handler = TimezoneHandler::new("UTC");
        let dt = handler.parse_timestamp("2024-02-29").unwrap();
        assert_eq!(dt.time(), NaiveTime::MIN);
    }

    #[test]
    fn test_parse_timestamp_empty_and_garbage() {
        let handler = TimezoneHandler::new("UTC");
        assert!(handler.parse_timestamp("").is_none());
        assert!(handler.parse_timestamp("   ").is_none());
        assert!(handler.parse_timestamp("not-a-date").is_none());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-01-31"),
            NaiveDate::from_ymd_opt(2024, 1, 31)
        );
        assert_eq!(
            parse_date("01/31/2024"),
            NaiveDate::from_ymd_opt(2024, 1, 31)
        );
        assert!(parse_date("31.01.2024").is_none());
    }

    #[test]
    fn test_get_system_timezone_returns_nonempty_string() {
        assert!(!get_system_timezone().is_empty());
    }
}
