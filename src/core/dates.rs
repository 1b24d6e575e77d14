//! Date parsing for the formats the two backends emit

use chrono::NaiveDate;

const ISO_FORMAT: &str = "%Y-%m-%d";
const DIRECTIVE_FORMAT: &str = "%d.%m.%Y";

/// Parse an ISO date, tolerating a trailing time part (`2024-05-01T00:00:00`)
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, ISO_FORMAT).ok()
}

/// Parse a `day.month.year` date as used by the catalog's directive dates
pub fn parse_directive_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DIRECTIVE_FORMAT).ok()
}

/// Date portion of a capture timestamp: everything before the first space
pub fn capture_day(taken_at: &str) -> &str {
    taken_at.split_once(' ').map_or(taken_at, |(day, _)| day)
}

/// Both present and equal; a missing side never counts as equal
pub fn dates_equal(a: Option<NaiveDate>, b: Option<NaiveDate>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

pub fn format_iso(date: NaiveDate) -> String {
    date.format(ISO_FORMAT).to_string()
}
