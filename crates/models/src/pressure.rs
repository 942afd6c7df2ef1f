use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Host memory-pressure signal, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressure {
    /// App is backgrounded or memory is getting tight.
    Background,
    Moderate,
    /// Memory is critically low.
    Complete,
}

impl MemoryPressure {
    /// Minimum idle time before a model is unloaded at this level.
    ///
    /// `Complete` unloads regardless of use; `Background` waits twice as long
    /// as `Moderate`.
    pub fn idle_threshold(self, base: Duration) -> Duration {
        match self {
            MemoryPressure::Complete => Duration::ZERO,
            MemoryPressure::Moderate => base,
            MemoryPressure::Background => base.saturating_mul(2),
        }
    }

    /// Whether a model idle for `idle` should be unloaded.
    pub fn should_unload(self, idle: Duration, base: Duration) -> bool {
        match self {
            MemoryPressure::Complete => true,
            _ => idle > self.idle_threshold(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(30);

    #[test]
    fn test_complete_is_unconditional() {
        assert!(MemoryPressure::Complete.should_unload(Duration::ZERO, BASE));
    }

    #[test]
    fn test_moderate_uses_threshold() {
        assert!(!MemoryPressure::Moderate.should_unload(Duration::from_secs(10), BASE));
        assert!(MemoryPressure::Moderate.should_unload(Duration::from_secs(31), BASE));
    }

    #[test]
    fn test_background_doubles_threshold() {
        assert!(!MemoryPressure::Background.should_unload(Duration::from_secs(45), BASE));
        assert!(MemoryPressure::Background.should_unload(Duration::from_secs(61), BASE));
        assert_eq!(
            MemoryPressure::Background.idle_threshold(BASE),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_severity_order_and_serde() {
        assert!(MemoryPressure::Background < MemoryPressure::Complete);
        let level: MemoryPressure = serde_json::from_str("\"moderate\"").unwrap();
        assert_eq!(level, MemoryPressure::Moderate);
    }
}
