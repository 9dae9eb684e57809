//! Signature timestamps as written by `~~~~` (`12:34, 5 March 2021 (UTC)`).

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Alternation over the full English month names, suitable for embedding in a regex.
pub fn month_alternation() -> String {
    MONTH_NAMES.join("|")
}

const SIGNATURE_FORMAT: &str = "%H:%M, %d %B %Y";
const SIGNATURE_FORMAT_WITH_SECONDS: &str = "%H:%M:%S, %d %B %Y";

static SIGNATURE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"\d{{2}}:\d{{2}}(?::\d{{2}})?, \d{{1,2}} (?:{}) \d{{4}}",
        month_alternation()
    );
    Regex::new(&pattern).expect("signature timestamp regex")
});

/// Parse `HH:MM, DD Month YYYY`, falling back to `HH:MM:SS, DD Month YYYY`.
///
/// Returns `None` for anything else; signatures are free text, so a malformed
/// stamp is expected input rather than an error.
pub fn parse_signature_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, SIGNATURE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, SIGNATURE_FORMAT_WITH_SECONDS))
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_signature_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format(SIGNATURE_FORMAT).to_string()
}

/// Every parseable signature timestamp in `text`, in document order.
pub fn scan_signature_timestamps(text: &str) -> Vec<DateTime<Utc>> {
    SIGNATURE_TIMESTAMP
        .find_iter(text)
        .filter_map(|found| {
            let parsed = parse_signature_timestamp(found.as_str());
            if parsed.is_none() {
                tracing::debug!(stamp = found.as_str(), "skipping invalid signature timestamp");
            }
            parsed
        })
        .collect()
}

/// Render elapsed seconds as `H:MM:SS`, prefixed by `N day(s), ` when at least a day.
pub fn format_elapsed(seconds: i64) -> String {
    let days = seconds.div_euclid(86_400);
    let rest = seconds.rem_euclid(86_400);
    let clock = format!("{}:{:02}:{:02}", rest / 3_600, (rest % 3_600) / 60, rest % 60);
    match days {
        0 => clock,
        1 | -1 => format!("{days} day, {clock}"),
        _ => format!("{days} days, {clock}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .expect("valid instant")
    }

    #[test]
    fn parses_plain_and_seconds_forms() {
        assert_eq!(
            parse_signature_timestamp("12:34, 05 March 2021"),
            Some(utc(2021, 3, 5, 12, 34, 0))
        );
        assert_eq!(
            parse_signature_timestamp("12:34, 5 March 2021"),
            Some(utc(2021, 3, 5, 12, 34, 0))
        );
        assert_eq!(
            parse_signature_timestamp("07:08:09, 31 December 1999"),
            Some(utc(1999, 12, 31, 7, 8, 9))
        );
    }

    #[test]
    fn malformed_timestamps_are_absent() {
        assert_eq!(parse_signature_timestamp("25:00, 1 January 2020"), None);
        assert_eq!(parse_signature_timestamp("10:00, 31 February 2020"), None);
        assert_eq!(parse_signature_timestamp("yesterday at noon"), None);
        assert_eq!(parse_signature_timestamp(""), None);
    }

    #[test]
    fn rendering_is_the_inverse_of_parsing() {
        for instant in [
            utc(2021, 3, 5, 12, 34, 0),
            utc(2004, 2, 29, 0, 0, 0),
            utc(2020, 12, 31, 23, 59, 0),
        ] {
            let rendered = format_signature_timestamp(&instant);
            assert_eq!(parse_signature_timestamp(&rendered), Some(instant));
        }
        assert_eq!(
            format_signature_timestamp(&utc(2021, 3, 5, 9, 4, 0)),
            "09:04, 05 March 2021"
        );
    }

    #[test]
    fn scan_skips_impossible_dates() {
        let text = "Hi. ~~ 10:00, 1 January 2020 (UTC)\nNope 10:00, 30 February 2020 (UTC)\n\
                    Later 11:15:30, 2 January 2020 (UTC)";
        assert_eq!(
            scan_signature_timestamps(text),
            vec![utc(2020, 1, 1, 10, 0, 0), utc(2020, 1, 2, 11, 15, 30)]
        );
    }

    #[test]
    fn elapsed_matches_day_clock_format() {
        assert_eq!(format_elapsed(0), "0:00:00");
        assert_eq!(format_elapsed(300), "0:05:00");
        assert_eq!(format_elapsed(86_400 + 2 * 3_600 + 3 * 60 + 4), "1 day, 2:03:04");
        assert_eq!(format_elapsed(3 * 86_400), "3 days, 0:00:00");
    }
}
