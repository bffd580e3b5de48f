//! Date and time parsing for flow steps
//!
//! Customers type dates and times loosely; the flows accept a small set of
//! relative keywords (with the common misspellings) and a strict ISO date,
//! plus a few tolerant time shapes. Anything else re-prompts the same step.

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// `H:MM am/pm`, `HH:MM`, or `Ham/pm`
static TIME_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\s*$").expect("static time regex")
});

/// Parse a date from a relative keyword or a strict `YYYY-MM-DD`
pub fn parse_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = input.trim().to_lowercase();
    if lower.contains("today") {
        return Some(today);
    }
    // "tomorrow" plus the misspellings customers actually send
    for word in ["tomorrow", "tommorrow", "tomorow", "tmr"] {
        if lower.contains(word) {
            return Some(today + Duration::days(1));
        }
    }
    NaiveDate::parse_from_str(lower.trim(), "%Y-%m-%d").ok()
}

/// Minutes since midnight for a loosely-shaped time string
///
/// Returns `None` for anything that does not look like a time; a bare hour
/// without am/pm is read on the 24-hour clock.
pub fn parse_time_minutes(input: &str) -> Option<u32> {
    let caps = TIME_SHAPE.captures(input)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let meridiem = caps.get(3).map(|m| m.as_str().to_lowercase());

    // A bare number with no minutes and no am/pm is too ambiguous
    if caps.get(2).is_none() && meridiem.is_none() {
        return None;
    }
    if minute > 59 {
        return None;
    }

    let hour = match meridiem.as_deref() {
        Some("am") => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            if hour == 12 {
                0
            } else {
                hour
            }
        }
        Some("pm") => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            if hour == 12 {
                12
            } else {
                hour + 12
            }
        }
        _ => {
            if hour > 23 {
                return None;
            }
            hour
        }
    };

    Some(hour * 60 + minute)
}

/// Whether the input has an acceptable time shape
pub fn is_valid_time(input: &str) -> bool {
    parse_time_minutes(input).is_some()
}

/// Do two `[start, start+duration)` windows (in minutes) overlap?
pub fn windows_overlap(a_start: u32, a_minutes: u32, b_start: u32, b_minutes: u32) -> bool {
    a_start < b_start + b_minutes && b_start < a_start + a_minutes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_relative_dates() {
        let today = day(2026, 8, 30);
        assert_eq!(parse_date("today", today), Some(today));
        assert_eq!(parse_date("Tomorrow", today), Some(day(2026, 8, 31)));
        // Misspellings
        assert_eq!(parse_date("tommorrow", today), Some(day(2026, 8, 31)));
        assert_eq!(parse_date("tomorow pls", today), Some(day(2026, 8, 31)));
        assert_eq!(parse_date("tmr", today), Some(day(2026, 8, 31)));
    }

    #[test]
    fn test_strict_iso_date() {
        let today = day(2026, 8, 30);
        assert_eq!(parse_date("2026-09-15", today), Some(day(2026, 9, 15)));
        assert_eq!(parse_date(" 2026-09-15 ", today), Some(day(2026, 9, 15)));
    }

    #[test]
    fn test_garbage_dates_rejected() {
        let today = day(2026, 8, 30);
        assert_eq!(parse_date("next tuesday", today), None);
        assert_eq!(parse_date("15/09/2026", today), None);
        assert_eq!(parse_date("", today), None);
    }

    #[test]
    fn test_time_shapes() {
        assert_eq!(parse_time_minutes("10am"), Some(600));
        assert_eq!(parse_time_minutes("10:30 am"), Some(630));
        assert_eq!(parse_time_minutes("2:15pm"), Some(14 * 60 + 15));
        assert_eq!(parse_time_minutes("14:00"), Some(840));
        assert_eq!(parse_time_minutes("12am"), Some(0));
        assert_eq!(parse_time_minutes("12pm"), Some(720));
    }

    #[test]
    fn test_bad_times_rejected() {
        assert!(!is_valid_time("soon"));
        assert!(!is_valid_time("25:00"));
        assert!(!is_valid_time("10:75"));
        assert!(!is_valid_time("13pm"));
        // Bare hour with no am/pm or minutes is ambiguous
        assert!(!is_valid_time("10"));
    }

    #[test]
    fn test_window_overlap() {
        // 10:00-11:00 vs 10:30-11:30
        assert!(windows_overlap(600, 60, 630, 60));
        // 10:00-11:00 vs 11:00-12:00 (touching, no overlap)
        assert!(!windows_overlap(600, 60, 660, 60));
        assert!(windows_overlap(600, 120, 660, 30));
    }
}
