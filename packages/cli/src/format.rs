//! Human-readable rendering helpers.

use chrono::{DateTime, Utc};

/// Describes how long ago `then` was relative to `now`, e.g. `"5 minutes ago"`.
#[must_use]
pub fn age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    if seconds < 0 {
        return "just now".to_string();
    }

    let (value, unit) = match seconds {
        0..=59 => return "less than a minute ago".to_string(),
        60..=3_599 => (seconds / 60, "minute"),
        3_600..=86_399 => (seconds / 3_600, "hour"),
        86_400..=2_591_999 => (seconds / 86_400, "day"),
        2_592_000..=31_535_999 => (seconds / 2_592_000, "month"),
        _ => (seconds / 31_536_000, "year"),
    };

    if value == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{value} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn describes_ages() {
        let now = Utc::now();
        assert_eq!(age(now, now), "less than a minute ago");
        assert_eq!(age(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(age(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(age(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(age(now - Duration::days(2), now), "2 days ago");
        assert_eq!(age(now + Duration::minutes(2), now), "just now");
    }
}
