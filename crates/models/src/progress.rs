use std::time::{Duration, Instant};

const MIN_STEP: f64 = 0.01;
const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Turns per-chunk byte counts into a throttled, non-decreasing fraction.
///
/// A value is emitted on the first update, on completion, and afterwards
/// whenever it advanced by at least 1% or 100 ms have passed since the last
/// emission.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    current: f64,
    last_emitted: Option<f64>,
    last_emit_at: Option<Instant>,
    min_step: f64,
    min_interval: Duration,
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressThrottle {
    pub fn new() -> Self {
        Self::with_limits(MIN_STEP, MIN_INTERVAL)
    }

    pub fn with_limits(min_step: f64, min_interval: Duration) -> Self {
        Self {
            current: 0.0,
            last_emitted: None,
            last_emit_at: None,
            min_step,
            min_interval,
        }
    }

    /// Highest fraction seen so far.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Record `downloaded` of `total` bytes; returns the fraction to report, if any.
    pub fn update(&mut self, downloaded: u64, total: u64) -> Option<f64> {
        let fraction = if total == 0 {
            0.0
        } else {
            (downloaded as f64 / total as f64).clamp(0.0, 1.0)
        };
        self.update_fraction(fraction, Instant::now())
    }

    pub(crate) fn update_fraction(&mut self, fraction: f64, now: Instant) -> Option<f64> {
        self.current = self.current.max(fraction);

        let due = match (self.last_emitted, self.last_emit_at) {
            (Some(last), Some(at)) => {
                self.current > last
                    && (self.current >= 1.0
                        || self.current - last >= self.min_step
                        || now.duration_since(at) >= self.min_interval)
            }
            _ => true,
        };
        if !due {
            return None;
        }

        self.last_emitted = Some(self.current);
        self.last_emit_at = Some(now);
        Some(self.current)
    }
}
