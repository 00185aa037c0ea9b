//! Capture cycle pacing.
//!
//! Tracks how long the current cycle has taken and computes how long to
//! wait before the next one, given a configured target interval. When a
//! cycle overruns its budget the next one starts immediately; cadence
//! accuracy is traded away so capture is never blocked indefinitely under
//! load.

use std::time::{Duration, Instant};

// ── CaptureScheduler ─────────────────────────────────────────────

/// Per-cycle timing state: the last cycle start, nothing else.
#[derive(Debug)]
pub struct CaptureScheduler {
    cycle_start: Instant,
}

impl CaptureScheduler {
    /// Create a scheduler; the first cycle is considered started now.
    pub fn new() -> Self {
        Self {
            cycle_start: Instant::now(),
        }
    }

    /// Mark the start of a capture cycle.
    pub fn begin_cycle(&mut self) {
        self.cycle_start = Instant::now();
    }

    /// Remaining time until the next cycle should start.
    ///
    /// Returns `target_interval - elapsed`, saturating at zero: the result
    /// is never negative, for any target and any elapsed time.
    pub fn next_capture_delay(&self, target_interval: Duration) -> Duration {
        target_interval.saturating_sub(self.cycle_start.elapsed())
    }
}

impl Default for CaptureScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_never_exceeds_target() {
        let mut scheduler = CaptureScheduler::new();
        scheduler.begin_cycle();
        let delay = scheduler.next_capture_delay(Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(100));
    }

    #[test]
    fn zero_target_yields_zero_delay() {
        let mut scheduler = CaptureScheduler::new();
        scheduler.begin_cycle();
        assert_eq!(scheduler.next_capture_delay(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn overrun_cycle_yields_zero_delay() {
        let mut scheduler = CaptureScheduler::new();
        scheduler.begin_cycle();
        std::thread::sleep(Duration::from_millis(15));
        // Work took longer than the 5 ms budget: start immediately.
        let delay = scheduler.next_capture_delay(Duration::from_millis(5));
        assert_eq!(delay, Duration::ZERO);
    }

    #[test]
    fn fresh_cycle_keeps_most_of_the_budget() {
        let mut scheduler = CaptureScheduler::new();
        scheduler.begin_cycle();
        let delay = scheduler.next_capture_delay(Duration::from_secs(10));
        assert!(delay > Duration::from_secs(9));
    }
}
