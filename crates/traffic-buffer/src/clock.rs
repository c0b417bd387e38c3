//! Capture timestamps

use std::time::SystemTime;

use tokio::time::Instant;

/// Wall clock that never runs backwards
///
/// Anchors `SystemTime` once and adds elapsed monotonic time, so capture
/// timestamps stay ordered across system clock adjustments. Elapsed time
/// comes from tokio's clock and therefore follows a paused test runtime.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    wall_anchor: SystemTime,
    mono_anchor: Instant,
}

impl MonotonicClock {
    /// Anchor a new clock at the current time
    pub fn new() -> Self {
        Self {
            wall_anchor: SystemTime::now(),
            mono_anchor: Instant::now(),
        }
    }

    /// Current wall-clock time
    pub fn now(&self) -> SystemTime {
        self.wall_anchor + self.mono_anchor.elapsed()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_follows_tokio_clock() {
        let clock = MonotonicClock::new();
        let before = clock.now();

        tokio::time::advance(Duration::from_secs(5)).await;

        let after = clock.now();
        assert_eq!(after.duration_since(before).unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_non_decreasing() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..1000 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }
}
