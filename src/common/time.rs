//! Time utilities with a clock abstraction for testability.

use chrono::Utc;

/// Clock trait for dependency injection and testing.
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in milliseconds.
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time).
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        unix_millis()
    }
}

/// Fixed clock for tests: always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Current Unix timestamp in milliseconds (UTC).
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_returns_non_zero_timestamp() {
        // given:
        let clock = SystemClock;

        // when:
        let timestamp = clock.now_millis();

        // then:
        assert!(timestamp > 0);
    }

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        // given:
        let clock = SystemClock;

        // when:
        let first = clock.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = clock.now_millis();

        // then:
        assert!(second >= first);
    }

    #[test]
    fn test_fixed_clock_returns_fixed_timestamp() {
        // given:
        let clock = FixedClock::new(1234567890123);

        // when:
        let first = clock.now_millis();
        let second = clock.now_millis();

        // then:
        assert_eq!(first, 1234567890123);
        assert_eq!(second, 1234567890123);
    }
}
