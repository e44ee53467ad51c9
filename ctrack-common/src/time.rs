//! Calendar utilities

use chrono::{DateTime, NaiveDate, Utc};

/// Date format of the raw vaccination feeds
pub const FEED_DATE_FORMAT: &str = "%Y-%m-%d";

/// Compact date format used by the structured API (`20210314`)
pub const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Time-frame presets (in days) offered to readers of the dataset
pub const ALL_TIME_DAYS: i64 = 18250;
pub const SIX_MONTHS_DAYS: i64 = 182;
pub const THREE_MONTHS_DAYS: i64 = 90;
pub const ONE_MONTH_DAYS: i64 = 30;
pub const TWO_WEEKS_DAYS: i64 = 14;
pub const FIVE_DAYS: i64 = 5;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// First day vaccination data exists in the feeds (day 0 of the vaccination window)
pub fn vaccination_campaign_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 12, 14).unwrap_or(NaiveDate::MIN)
}

/// Parse a `YYYY-MM-DD` feed date
pub fn parse_feed_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), FEED_DATE_FORMAT).ok()
}

/// Parse a structured API date, either the integer `YYYYMMDD` form or `YYYY-MM-DD`
pub fn parse_compact_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, COMPACT_DATE_FORMAT)
        .ok()
        .or_else(|| parse_feed_date(value))
}

/// Whole days from `start` to `date` (negative when `date` is earlier)
pub fn days_between(start: NaiveDate, date: NaiveDate) -> i64 {
    date.signed_duration_since(start).num_days()
}

/// Start date of a trailing time frame ending today
pub fn days_ago(days: i64) -> NaiveDate {
    let today = now().date_naive();
    today
        .checked_sub_signed(chrono::Duration::days(days.max(0)))
        .unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_campaign_start() {
        assert_eq!(vaccination_campaign_start(), ymd(2020, 12, 14));
    }

    #[test]
    fn test_parse_feed_date() {
        assert_eq!(parse_feed_date("2021-01-02"), Some(ymd(2021, 1, 2)));
        assert_eq!(parse_feed_date(" 2021-01-02 "), Some(ymd(2021, 1, 2)));
        assert_eq!(parse_feed_date("01/02/2021"), None);
        assert_eq!(parse_feed_date("2021-02-30"), None);
        assert_eq!(parse_feed_date(""), None);
    }

    #[test]
    fn test_parse_compact_date_accepts_both_forms() {
        assert_eq!(parse_compact_date("20210307"), Some(ymd(2021, 3, 7)));
        assert_eq!(parse_compact_date("2021-03-07"), Some(ymd(2021, 3, 7)));
        assert_eq!(parse_compact_date("2021037"), None);
    }

    #[test]
    fn test_days_between_signs() {
        let start = vaccination_campaign_start();
        assert_eq!(days_between(start, start), 0);
        assert_eq!(days_between(start, ymd(2020, 12, 20)), 6);
        assert_eq!(days_between(start, ymd(2020, 12, 1)), -13);
        assert_eq!(days_between(start, ymd(2021, 1, 1)), 18);
    }

    #[test]
    fn test_days_ago_is_in_the_past() {
        let today = now().date_naive();
        assert_eq!(days_ago(0), today);
        assert_eq!(days_between(days_ago(THREE_MONTHS_DAYS), today), THREE_MONTHS_DAYS);
        assert_eq!(days_ago(-5), today);
    }
}
