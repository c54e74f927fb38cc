//! Clock and window arithmetic shared by the governor and scheduler.

use chrono::{DateTime, Duration, Utc};

/// UTC instant; every stored time in the system uses it.
pub type Timestamp = DateTime<Utc>;

/// Span of the rolling window the daily execution cap counts in.
pub const DAILY_CAP_WINDOW_HOURS: u32 = 24;

#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Whole hours as a signed chrono span.
#[must_use]
pub fn hours(count: u32) -> Duration {
    Duration::hours(i64::from(count))
}

/// Start of the rolling daily-cap window ending at `at`.
#[must_use]
pub fn daily_cap_window_start(at: Timestamp) -> Timestamp {
    at - hours(DAILY_CAP_WINDOW_HOURS)
}

/// `true` while less than `span` has passed between `since` and `at`.
///
/// A `since` in the future (clock skew) also counts as within.
#[must_use]
pub fn within(since: Timestamp, at: Timestamp, span: Duration) -> bool {
    at.signed_duration_since(since) < span
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        assert!(ts >= before);
        assert!(ts <= Utc::now());
    }

    #[test]
    fn should_open_daily_window_one_day_back() {
        let at = now();
        assert_eq!(at - daily_cap_window_start(at), Duration::days(1));
    }

    #[test]
    fn should_be_within_span_until_it_fully_elapses() {
        let at = now();
        assert!(within(at - hours(3), at, hours(4)));
        assert!(!within(at - hours(4), at, hours(4)));
        assert!(!within(at - hours(5), at, hours(4)));
    }

    #[test]
    fn should_never_be_within_zero_span_when_since_is_past() {
        let at = now();
        assert!(!within(at, at, hours(0)));
        assert!(!within(at - Duration::seconds(1), at, hours(0)));
    }

    #[test]
    fn should_treat_future_since_as_within() {
        let at = now();
        assert!(within(at + hours(1), at, hours(2)));
    }
}
