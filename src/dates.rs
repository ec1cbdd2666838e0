// Date text normalization between storage and display forms

use chrono::{DateTime, Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static CANONICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})$").expect("valid canonical date regex"));

static DAY_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{2})[/-]([0-9]{2})[/-]([0-9]{4})$").expect("valid day-first date regex"));

/// Formats tried by the general fallback parser, in order
const FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%Y.%m.%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
    "%a %b %d %Y",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Convert date text to the canonical `YYYY-MM-DD` storage form.
///
/// Text that cannot be interpreted is returned trimmed but otherwise as-is;
/// this never fails and never drops data.
pub fn to_canonical(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    if CANONICAL.is_match(text) {
        return text.to_string();
    }
    if let Some(caps) = DAY_FIRST.captures(text) {
        return format!("{}-{}-{}", &caps[3], &caps[2], &caps[1]);
    }
    match parse_fallback(text) {
        Some(date) => format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day()),
        None => text.to_string(),
    }
}

/// Convert date text to the `DD/MM/YYYY` display form
pub fn to_display(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    if let Some(caps) = CANONICAL.captures(text) {
        return format!("{}/{}/{}", &caps[3], &caps[2], &caps[1]);
    }
    if DAY_FIRST.is_match(text) {
        return text.replace('-', "/");
    }
    match parse_fallback(text) {
        Some(date) => format!("{:02}/{:02}/{:04}", date.day(), date.month(), date.year()),
        None => text.to_string(),
    }
}

fn parse_fallback(text: &str) -> Option<NaiveDate> {
    let date = DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| {
            FALLBACK_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        })?;

    // Years outside four digits would not survive a second pass
    (1..=9999).contains(&date.year()).then_some(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_unchanged() {
        assert_eq!(to_canonical("2024-01-05"), "2024-01-05");
        assert_eq!(to_canonical("  2024-01-05 "), "2024-01-05");
    }

    #[test]
    fn test_day_first_is_positional() {
        assert_eq!(to_canonical("05/01/2024"), "2024-01-05");
        assert_eq!(to_canonical("05-01-2024"), "2024-01-05");
        // No calendar validation on the positional form
        assert_eq!(to_canonical("31/02/2024"), "2024-02-31");
    }

    #[test]
    fn test_fallback_parse() {
        assert_eq!(to_canonical("January 5, 2024"), "2024-01-05");
        assert_eq!(to_canonical("5 Jan 2024"), "2024-01-05");
        assert_eq!(to_canonical("2024/01/05"), "2024-01-05");
        assert_eq!(to_canonical("2024-1-5"), "2024-01-05");
        // Unpadded slash dates go through the general parser, month first
        assert_eq!(to_canonical("1/5/2024"), "2024-01-05");
        assert_eq!(to_canonical("2024-01-05T10:30:00Z"), "2024-01-05");
    }

    #[test]
    fn test_unparseable_passes_through() {
        assert_eq!(to_canonical("next tuesday"), "next tuesday");
        assert_eq!(to_display("soon"), "soon");
        assert_eq!(to_canonical(""), "");
        assert_eq!(to_display("   "), "");
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(to_display("2024-01-05"), "05/01/2024");
        assert_eq!(to_display("05-01-2024"), "05/01/2024");
        assert_eq!(to_display("05/01/2024"), "05/01/2024");
        assert_eq!(to_display("January 5, 2024"), "05/01/2024");
    }

    #[test]
    fn test_round_trip_through_display() {
        for input in [
            "2024-01-05",
            "05/01/2024",
            "05-01-2024",
            "January 5, 2024",
            "2023-12-31T23:00:00+00:00",
            "31/02/2024",
        ] {
            let canonical = to_canonical(input);
            assert_eq!(to_canonical(&to_display(&canonical)), canonical, "input {:?}", input);
        }
    }

    #[test]
    fn test_idempotent() {
        for input in ["2024-01-05", "05-01-2024", "Jan 5 2024", "garbage", "", "12/2024"] {
            let c = to_canonical(input);
            assert_eq!(to_canonical(&c), c, "canonical of {:?}", input);
            let d = to_display(input);
            assert_eq!(to_display(&d), d, "display of {:?}", input);
        }
    }
}
