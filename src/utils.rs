/// Utility functions for clock handling and number formatting
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::models::Timestamp;

/// Current host time in the local zone
///
/// Falls back to UTC when the local offset cannot be determined (for example
/// in a multi-threaded process on some platforms).
pub fn host_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Header placed in front of the text report
///
/// Produces `Date YYYY-Mon-DD` and `Time HH:MM:SS` lines, each terminated by
/// a newline.
pub fn format_report_header(dt: &OffsetDateTime) -> String {
    let date = format_description!("[year]-[month repr:short]-[day]");
    let clock = format_description!("[hour]:[minute]:[second]");
    format!(
        "Date {}\nTime {}\n",
        dt.format(&date).unwrap_or_else(|_| dt.date().to_string()),
        dt.format(&clock).unwrap_or_else(|_| dt.time().to_string()),
    )
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Convert a station timestamp into a calendar date-time
///
/// Returns None when the station reported an impossible date.
pub fn to_primitive(ts: &Timestamp) -> Option<PrimitiveDateTime> {
    let month = time::Month::try_from(ts.month).ok()?;
    let date = time::Date::from_calendar_date(ts.year, month, ts.day).ok()?;
    let clock = time::Time::from_hms(ts.hour, ts.minute, ts.second.unwrap_or(0)).ok()?;
    Some(PrimitiveDateTime::new(date, clock))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn report_header_uses_short_month() {
        let header = format_report_header(&datetime!(2024-03-07 08:04:09 UTC));
        assert_eq!(header, "Date 2024-Mar-07\nTime 08:04:09\n");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to(21.26, 1), 21.3);
        assert_eq!(round_to(-2.44, 1), -2.4);
    }

    #[test]
    fn rejects_impossible_station_dates() {
        assert!(to_primitive(&Timestamp::new(2024, 2, 30, 0, 0)).is_none());
        let ok = to_primitive(&Timestamp::new(2024, 2, 29, 23, 59).with_second(1)).unwrap();
        assert_eq!(ok, datetime!(2024-02-29 23:59:01));
    }
}
