use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Rendering used by the list views when a stored date cannot be parsed.
pub const INVALID_DATE: &str = "Invalid Date";

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Storage timestamps are RFC3339 text in UTC with millisecond precision.
pub fn now_rfc3339() -> String {
    to_rfc3339(Utc::now())
}

pub fn to_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Formats a stored date as a long US date, e.g. `October 16, 2026`.
///
/// Accepts RFC3339 timestamps (rendered in their own offset) and bare
/// `YYYY-MM-DD` dates. Anything else yields [`INVALID_DATE`].
pub fn format_long_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return parsed.format("%B %-d, %Y").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.format("%B %-d, %Y").to_string();
    }
    INVALID_DATE.to_string()
}

/// Parses either storage form back into a calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%B %d, %Y").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_reasonable() {
        let a = now_ms();
        assert!(a > 1_500_000_000_000); // after 2017
        assert!(a < 4_100_000_000_000); // before year ~2100
    }

    #[test]
    fn long_dates_use_month_names() {
        assert_eq!(format_long_date("2023-05-15T09:30:00.000Z"), "May 15, 2023");
        assert_eq!(format_long_date("2024-01-02"), "January 2, 2024");
    }

    #[test]
    fn offset_is_respected() {
        assert_eq!(
            format_long_date("2023-05-15T23:30:00-02:00"),
            "May 15, 2023"
        );
    }

    #[test]
    fn malformed_dates_are_not_guarded() {
        assert_eq!(format_long_date("yesterday"), INVALID_DATE);
        assert_eq!(format_long_date(""), INVALID_DATE);
    }

    #[test]
    fn parse_date_accepts_display_form() {
        let parsed = parse_date("May 8, 2023").expect("display date parses");
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2023, 5, 8).unwrap());
    }
}
