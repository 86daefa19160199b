use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Formats `target` relative to `now`, e.g. "in 15 minutes" or "2 hours ago".
///
/// The largest unit that fits is used and the count is truncated, so 119
/// seconds reads as "in 1 minute".
pub fn format_relative(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (target - now).num_seconds();
    if delta == 0 {
        return "now".to_string();
    }

    let magnitude = delta.unsigned_abs() as i64;
    let (count, unit) = if magnitude < MINUTE {
        (magnitude, "second")
    } else if magnitude < HOUR {
        (magnitude / MINUTE, "minute")
    } else if magnitude < DAY {
        (magnitude / HOUR, "hour")
    } else {
        (magnitude / DAY, "day")
    };
    let plural = if count == 1 { "" } else { "s" };

    if delta > 0 {
        format!("in {count} {unit}{plural}")
    } else {
        format!("{count} {unit}{plural} ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-16T10:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn formats_future_instants() {
        let now = base();
        assert_eq!(format_relative(now + Duration::seconds(1), now), "in 1 second");
        assert_eq!(format_relative(now + Duration::seconds(45), now), "in 45 seconds");
        assert_eq!(format_relative(now + Duration::seconds(119), now), "in 1 minute");
        assert_eq!(format_relative(now + Duration::minutes(15), now), "in 15 minutes");
        assert_eq!(format_relative(now + Duration::hours(2), now), "in 2 hours");
        assert_eq!(format_relative(now + Duration::days(3), now), "in 3 days");
    }

    #[test]
    fn formats_past_instants() {
        let now = base();
        assert_eq!(format_relative(now - Duration::minutes(30), now), "30 minutes ago");
        assert_eq!(format_relative(now - Duration::minutes(60), now), "1 hour ago");
        assert_eq!(format_relative(now - Duration::days(1), now), "1 day ago");
    }

    #[test]
    fn same_instant_is_now() {
        assert_eq!(format_relative(base(), base()), "now");
        // Sub-second differences truncate to zero seconds.
        assert_eq!(
            format_relative(base() + Duration::milliseconds(400), base()),
            "now"
        );
    }
}
