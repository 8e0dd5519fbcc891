//! Human-facing text for notifications and close records.

use chrono::{DateTime, Local, Utc};

/// Remaining time as "`H hours and M minutes`".
///
/// Either unit is dropped when zero (and the conjunction with it). Anything
/// under a minute, including an overdue deadline, reads "less than a minute".
pub fn format_remaining(remaining: chrono::Duration) -> String {
    let total_minutes = remaining.num_minutes().max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    match (hours, minutes) {
        (0, 0) => "less than a minute".to_string(),
        (0, m) => format!("{m} minutes"),
        (h, 0) => format!("{h} hours"),
        (h, m) => format!("{h} hours and {m} minutes"),
    }
}

/// Scheduled-close timestamp in local time, `YYYY-MM-DD hh:mm:ss`.
pub fn format_close_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn remaining_drops_zero_units() {
        assert_eq!(
            format_remaining(Duration::hours(5) + Duration::minutes(12)),
            "5 hours and 12 minutes"
        );
        assert_eq!(format_remaining(Duration::hours(23)), "23 hours");
        assert_eq!(format_remaining(Duration::minutes(29)), "29 minutes");
        assert_eq!(
            format_remaining(Duration::minutes(59) + Duration::seconds(59)),
            "59 minutes"
        );
    }

    #[test]
    fn remaining_under_a_minute_or_overdue() {
        assert_eq!(format_remaining(Duration::seconds(30)), "less than a minute");
        assert_eq!(format_remaining(Duration::minutes(-5)), "less than a minute");
    }

    #[test]
    fn close_timestamp_is_zero_padded_local_time() {
        let local = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let utc = local.with_timezone(&Utc);
        assert_eq!(format_close_timestamp(utc), "2026-03-04 05:06:07");
    }
}
