//! Timestamp utilities

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Whole seconds elapsed from `then` to `now`, clamped at zero
///
/// Clock skew between replicas can put `then` in the future; that reads as age 0.
pub fn age_secs(then: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    now.signed_duration_since(then).num_seconds().max(0) as u64
}

/// Source of "now" for code that makes time-based decisions
///
/// Cache freshness and TTL arithmetic read the time through this trait so
/// tests can move time deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `secs` seconds
    pub fn advance_secs(&self, secs: i64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += Duration::seconds(secs);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_millis_to_duration_one_second() {
        let duration = millis_to_duration(1000);
        assert_eq!(duration, StdDuration::from_secs(1));
    }

    #[test]
    fn test_age_secs_counts_whole_seconds() {
        let then = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = then + Duration::milliseconds(90_500);
        assert_eq!(age_secs(then, later), 90);
    }

    #[test]
    fn test_age_secs_future_timestamp_is_zero() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let future = now + Duration::seconds(30);
        assert_eq!(age_secs(future, now), 0);
    }

    #[test]
    fn test_manual_clock_advances_only_on_request() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance_secs(61);
        assert_eq!(clock.now(), start + Duration::seconds(61));

        // Clones share the same timeline
        let shared = clock.clone();
        shared.advance_secs(1);
        assert_eq!(clock.now(), start + Duration::seconds(62));
    }

    #[tokio::test]
    async fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let time1 = clock.now();
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        let time2 = clock.now();
        assert!(time2 > time1);
    }
}
