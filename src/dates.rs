// 📅 Date Normalization
// Marketplace exports disagree on date formats; the output speaks YYYY-MM-DD only.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Date-only layouts, tried in order. Numeric day/month layouts are month-first.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%d-%b-%Y",
];

/// Date-and-time layouts; the time of day is discarded.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%b %d, %Y %I:%M:%S %p",
    "%b %d, %Y %I:%M %p",
    "%d %b %Y %H:%M:%S",
];

/// Parse a marketplace date string into a calendar date.
///
/// Timezone-qualified timestamps keep the date as written in the export,
/// not the UTC date. Returns `None` when no known layout matches.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.date());
        }
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = DateTime::parse_from_rfc2822(value) {
        return Some(datetime.date_naive());
    }
    // Amazon settlement reports: "2024-02-05 10:31:00 UTC"
    if let Some(stripped) = value.strip_suffix(" UTC") {
        return parse_date(stripped);
    }

    None
}

/// Canonical rendering used in the output table.
pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse and re-render in one step; `None` is the null-date sentinel.
pub fn normalize_date(raw: &str) -> Option<String> {
    parse_date(raw).map(|d| format_date(&d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_day_in_many_layouts() {
        let inputs = [
            "2024-02-05",
            "2024/02/05",
            "02/05/2024",
            "02-05-2024",
            "05 Feb 2024",
            "Feb 05, 2024",
            "February 5, 2024",
            "05-Feb-2024",
            "2024-02-05 14:22:10",
            "2024-02-05T14:22:10",
            "2024-02-05T14:22:10+05:30",
            "02/05/2024 09:15",
            "Feb 05, 2024 09:15 PM",
            "2024-02-05 10:31:00 UTC",
        ];

        for input in inputs {
            assert_eq!(
                normalize_date(input).as_deref(),
                Some("2024-02-05"),
                "failed for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_unparseable_dates_are_null() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("   "), None);
        assert_eq!(normalize_date("not a date"), None);
        assert_eq!(normalize_date("2024-13-45"), None);
    }

    #[test]
    fn test_offset_keeps_local_date() {
        // 23:30 at +05:30 is still the 5th locally
        assert_eq!(
            normalize_date("2024-02-05T23:30:00+05:30").as_deref(),
            Some("2024-02-05")
        );
    }
}
