use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

/// Counters for one service since creation or the last reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceStats {
    pub calls: u64,
    /// Calls answered by the model.
    pub model_calls: u64,
    /// Calls answered without the model (patterns, heuristics, lexicon).
    pub fallback_calls: u64,
    pub cache_hits: u64,
    pub errors: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Default)]
pub struct StatsRecorder {
    inner: Mutex<ServiceStats>,
}

/// How a call was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Model,
    Fallback,
    CacheHit,
    Error,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServiceStats> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn record(&self, outcome: Outcome, elapsed: Duration) {
        let mut stats = self.lock();
        stats.calls += 1;
        match outcome {
            Outcome::Model => stats.model_calls += 1,
            Outcome::Fallback => stats.fallback_calls += 1,
            Outcome::CacheHit => stats.cache_hits += 1,
            Outcome::Error => stats.errors += 1,
        }
        let ms = elapsed.as_secs_f64() * 1000.0;
        stats.avg_latency_ms += (ms - stats.avg_latency_ms) / stats.calls as f64;
    }

    pub fn snapshot(&self) -> ServiceStats {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = ServiceStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average_and_counters() {
        let stats = StatsRecorder::new();
        stats.record(Outcome::Model, Duration::from_millis(10));
        stats.record(Outcome::Fallback, Duration::from_millis(30));
        stats.record(Outcome::Error, Duration::from_millis(20));

        let snap = stats.snapshot();
        assert_eq!(snap.calls, 3);
        assert_eq!(snap.model_calls, 1);
        assert_eq!(snap.fallback_calls, 1);
        assert_eq!(snap.errors, 1);
        assert!((snap.avg_latency_ms - 20.0).abs() < 1e-6);

        stats.reset();
        assert_eq!(stats.snapshot(), ServiceStats::default());
    }
}
