//! Human duration parsing and formatting for reminder scheduling
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: `deadline_after` rejects times the calendar or database cannot hold
//! - 1.1.0: Return `chrono::Duration`, shared by the remind command and snooze replies
//! - 1.0.0: Initial release

use chrono::{DateTime, Datelike, Duration, Utc};

/// Latest year a stored timestamp can carry (`%Y` is four digits)
const MAX_YEAR: i32 = 9999;

/// Parse compound durations like "30m", "2h", "1d" or "1h30m"
///
/// Every number needs a unit (`s`, `m`, `h`, `d`, `w`). Zero totals are rejected.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();
    let mut total_seconds: i64 = 0;
    let mut current_number = String::new();

    for c in input.chars() {
        if c.is_ascii_digit() {
            current_number.push(c);
            continue;
        }
        if current_number.is_empty() {
            return None;
        }
        let value: i64 = current_number.parse().ok()?;
        current_number.clear();

        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 60 * 60 * 24,
            'w' => 60 * 60 * 24 * 7,
            _ => return None,
        };
        total_seconds = total_seconds.checked_add(value.checked_mul(unit)?)?;
    }

    // Trailing number without a unit
    if !current_number.is_empty() || total_seconds <= 0 {
        return None;
    }
    Duration::try_seconds(total_seconds)
}

/// `now + delay`, or `None` when the result leaves the storable range
pub fn deadline_after(now: DateTime<Utc>, delay: Duration) -> Option<DateTime<Utc>> {
    now.checked_add_signed(delay)
        .filter(|at| at.year() <= MAX_YEAR)
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" })
}

/// Format a duration the way users read it: "45 minutes", "1 hour 30 minutes"
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    if seconds < 60 {
        plural(seconds, "second")
    } else if seconds < 3600 {
        plural(seconds / 60, "minute")
    } else if seconds < 86400 {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        if mins > 0 {
            format!("{} {}", plural(hours, "hour"), plural(mins, "minute"))
        } else {
            plural(hours, "hour")
        }
    } else {
        let days = seconds / 86400;
        let hours = (seconds % 86400) / 3600;
        if hours > 0 {
            format!("{} {}", plural(days, "day"), plural(hours, "hour"))
        } else {
            plural(days, "day")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::seconds(30)));
        assert_eq!(parse_duration("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_duration("2H"), Some(Duration::hours(2)));
        assert_eq!(parse_duration("1d"), Some(Duration::days(1)));
        assert_eq!(parse_duration("1w"), Some(Duration::weeks(1)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("invalid"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("15"), None);
        assert_eq!(parse_duration("0m"), None);
    }

    #[test]
    fn test_deadline_after() {
        let now = Utc::now();
        assert_eq!(
            deadline_after(now, Duration::hours(1)),
            Some(now + Duration::hours(1))
        );
        assert_eq!(deadline_after(now, Duration::hours(3_000_000_000)), None);
        assert_eq!(deadline_after(now, Duration::days(100_000_000)), None);
        assert_eq!(deadline_after(now, Duration::days(365 * 9000)), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(1)), "1 second");
        assert_eq!(format_duration(Duration::seconds(30)), "30 seconds");
        assert_eq!(format_duration(Duration::minutes(1)), "1 minute");
        assert_eq!(format_duration(Duration::minutes(15)), "15 minutes");
        assert_eq!(format_duration(Duration::hours(1)), "1 hour");
        assert_eq!(format_duration(Duration::minutes(61)), "1 hour 1 minute");
        assert_eq!(format_duration(Duration::days(1)), "1 day");
        assert_eq!(format_duration(Duration::hours(25)), "1 day 1 hour");
    }
}
