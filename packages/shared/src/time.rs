//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, FixedOffset, Local, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Current Unix timestamp (milliseconds)
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
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

/// UTC offset of the machine's local time zone right now.
pub fn local_offset() -> FixedOffset {
    *Local::now().offset()
}

/// Format a Unix timestamp (milliseconds) as `HH:MM:SS` at the given offset.
///
/// Out-of-range timestamps fall back to the Unix epoch.
pub fn format_clock_time(timestamp_millis: i64, offset: FixedOffset) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_millis)
        .unwrap_or_default()
        .with_timezone(&offset)
        .format("%H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_returns_increasing_timestamps() {
        // テスト項目: SystemClock が呼び出すたびに増加するタイムスタンプを返す
        // given (前提条件):
        let clock = SystemClock;

        // when (操作):
        let timestamp1 = clock.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let timestamp2 = clock.now_millis();

        // then (期待する結果):
        assert!(timestamp1 > 0);
        assert!(timestamp2 >= timestamp1);
    }

    #[test]
    fn test_fixed_clock_returns_fixed_timestamp() {
        // テスト項目: FixedClock が固定されたタイムスタンプを返す
        // given (前提条件):
        let fixed_time = 1234567890123;
        let clock = FixedClock::new(fixed_time);

        // when (操作):
        let timestamp1 = clock.now_millis();
        let timestamp2 = clock.now_millis();

        // then (期待する結果):
        assert_eq!(timestamp1, fixed_time);
        assert_eq!(timestamp2, fixed_time);
    }

    #[test]
    fn test_format_clock_time_applies_offset() {
        // テスト項目: 指定したオフセットで時刻が整形される
        // given (前提条件):
        // 2023-01-01 00:00:00 UTC
        let timestamp = 1672531200000;
        let utc = FixedOffset::east_opt(0).unwrap();
        let jst = FixedOffset::east_opt(9 * 3600).unwrap();

        // when (操作):
        let at_utc = format_clock_time(timestamp, utc);
        let at_jst = format_clock_time(timestamp + 5_123, jst);

        // then (期待する結果):
        assert_eq!(at_utc, "00:00:00");
        assert_eq!(at_jst, "09:00:05");
    }
}
