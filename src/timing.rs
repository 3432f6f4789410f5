//! Display-refresh timing, fed by an external once-per-refresh callback.
//!
//! The clock is written from the display thread and read from the polling
//! loop, so it only uses atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Records display refreshes on a monotonic timeline anchored at creation.
pub struct FrameClock {
    epoch: Instant,
    last_refresh_bits: AtomicU64,
    interval_bits: AtomicU64,
    refresh_count: AtomicU64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_refresh_bits: AtomicU64::new(f64::NAN.to_bits()),
            interval_bits: AtomicU64::new(f64::NAN.to_bits()),
            refresh_count: AtomicU64::new(0),
        }
    }

    /// Seconds since the clock was created.
    pub fn now_s(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Seconds since the clock was created, at `instant`.
    pub fn seconds_at(&self, instant: Instant) -> f64 {
        instant.saturating_duration_since(self.epoch).as_secs_f64()
    }

    /// Record a display refresh at `timestamp_s` (clock seconds). The refresh
    /// interval is measured from consecutive timestamps; out-of-order or
    /// repeated timestamps leave the interval unchanged.
    pub fn on_display_refresh(&self, timestamp_s: f64) {
        let prev = f64::from_bits(
            self.last_refresh_bits
                .swap(timestamp_s.to_bits(), Ordering::AcqRel),
        );
        self.refresh_count.fetch_add(1, Ordering::Relaxed);
        if prev.is_finite() && timestamp_s > prev {
            self.interval_bits
                .store((timestamp_s - prev).to_bits(), Ordering::Release);
        }
    }

    /// Record a display refresh happening now.
    pub fn on_display_refresh_now(&self) {
        self.on_display_refresh(self.now_s());
    }

    pub fn snapshot(&self) -> FrameTiming {
        let last = f64::from_bits(self.last_refresh_bits.load(Ordering::Acquire));
        let interval = f64::from_bits(self.interval_bits.load(Ordering::Acquire));
        FrameTiming {
            last_refresh_s: last.is_finite().then_some(last),
            refresh_interval_s: (interval.is_finite() && interval > 0.0).then_some(interval),
            refresh_count: self.refresh_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the most recent display timing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTiming {
    pub last_refresh_s: Option<f64>,
    pub refresh_interval_s: Option<f64>,
    pub refresh_count: u64,
}

impl FrameTiming {
    pub fn refresh_rate_hz(&self) -> Option<f64> {
        self.refresh_interval_s.map(|i| 1.0 / i)
    }

    pub fn seconds_since_refresh(&self, now_s: f64) -> Option<f64> {
        self.last_refresh_s.map(|last| (now_s - last).max(0.0))
    }

    /// Forward offset for pose prediction: time from `now_s` until the next
    /// refresh boundary, plus `extra_s` of fixed display latency. Falls back
    /// to `extra_s` alone until two refreshes have been seen.
    pub fn prediction_delta(&self, now_s: f64, extra_s: f64) -> f64 {
        let until_refresh = match (self.last_refresh_s, self.refresh_interval_s) {
            (Some(last), Some(interval)) => {
                let since = (now_s - last).max(0.0);
                interval - since % interval
            }
            _ => 0.0,
        };
        (until_refresh + extra_s).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_timing_uses_extra_only() {
        let clock = FrameClock::new();
        let timing = clock.snapshot();
        assert_eq!(timing.last_refresh_s, None);
        assert_eq!(timing.refresh_rate_hz(), None);
        assert!((timing.prediction_delta(5.0, 0.011) - 0.011).abs() < 1e-12);
        assert_eq!(timing.prediction_delta(5.0, -1.0), 0.0);
    }

    #[test]
    fn test_interval_measured_between_refreshes() {
        let clock = FrameClock::new();
        clock.on_display_refresh(1.0);
        assert_eq!(clock.snapshot().refresh_interval_s, None);
        clock.on_display_refresh(1.0 + 1.0 / 90.0);
        let timing = clock.snapshot();
        assert!((timing.refresh_rate_hz().unwrap() - 90.0).abs() < 1e-6);
        assert_eq!(timing.refresh_count, 2);
    }

    #[test]
    fn test_repeated_timestamp_keeps_interval() {
        let clock = FrameClock::new();
        clock.on_display_refresh(1.0);
        clock.on_display_refresh(1.5);
        clock.on_display_refresh(1.5);
        assert_eq!(clock.snapshot().refresh_interval_s, Some(0.5));
    }

    #[test]
    fn test_delta_runs_to_next_refresh() {
        let timing = FrameTiming {
            last_refresh_s: Some(10.0),
            refresh_interval_s: Some(0.01),
            refresh_count: 2,
        };
        // 3 ms after a refresh: 7 ms until the next one.
        let d = timing.prediction_delta(10.003, 0.0);
        assert!((d - 0.007).abs() < 1e-9);
        // Several refreshes late still lands on the next boundary.
        let d = timing.prediction_delta(10.0425, 0.02);
        assert!((d - (0.0075 + 0.02)).abs() < 1e-9);
        assert!((timing.seconds_since_refresh(10.003).unwrap() - 0.003).abs() < 1e-12);
    }

    #[test]
    fn test_seconds_at_is_monotonic() {
        let clock = FrameClock::new();
        let later = Instant::now() + std::time::Duration::from_millis(250);
        assert!(clock.seconds_at(later) >= 0.25);
    }
}
