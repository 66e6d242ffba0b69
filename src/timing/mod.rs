//! Stream timebase
//!
//! Capture timestamps are microseconds since the clock was created, carried
//! as `u32` on the wire (wrapping after roughly 71 minutes).

use std::time::Instant;

/// Monotonic clock started when a stream (or stream generation) starts
#[derive(Debug, Clone, Copy)]
pub struct StreamClock {
    start: Instant,
}

impl StreamClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Wire timestamp for "now"
    #[inline]
    pub fn timestamp(&self) -> u32 {
        self.start.elapsed().as_micros() as u32
    }
}

impl Default for StreamClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Events per second over `elapsed_secs`, 0 before any time has passed.
pub fn rate_per_sec(count: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        count as f64 / elapsed_secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timestamps_are_monotonic() {
        let clock = StreamClock::new();
        let a = clock.timestamp();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.timestamp();
        assert!(b > a);
    }

    #[test]
    fn test_timestamp_is_microseconds() {
        let clock = StreamClock::new();
        std::thread::sleep(Duration::from_millis(5));
        let ts = clock.timestamp();
        assert!(ts >= 5_000);
        assert!(clock.elapsed_secs() * 1_000_000.0 >= ts as f64);
    }

    #[test]
    fn test_rate_per_sec() {
        assert_eq!(rate_per_sec(30, 0.0), 0.0);
        assert!((rate_per_sec(60, 2.0) - 30.0).abs() < f64::EPSILON);
    }
}
