use crate::default_cache_dir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Idle time after which a moderate memory-pressure signal unloads a model.
pub const DEFAULT_IDLE_UNLOAD_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Root of the verified artifact cache; one sub-directory per model.
    pub cache_dir: PathBuf,
    /// Directory of artifacts shipped with the host application, laid out
    /// like the cache. Checked before any network fetch.
    pub bundled_dir: Option<PathBuf>,
    pub idle_unload_after_secs: u64,
    /// Re-hash cached artifacts on startup when a checksum is known.
    pub verify_checksums_on_startup: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            bundled_dir: None,
            idle_unload_after_secs: DEFAULT_IDLE_UNLOAD_SECS,
            verify_checksums_on_startup: true,
        }
    }
}

impl ManagerConfig {
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn idle_unload_after(&self) -> Duration {
        Duration::from_secs(self.idle_unload_after_secs)
    }

    /// Staging area for in-progress downloads; never read as a cache entry.
    pub(crate) fn staging_dir(&self) -> PathBuf {
        self.cache_dir.join(".staging")
    }

    pub(crate) fn model_dir(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.idle_unload_after(), Duration::from_secs(30));
        assert!(config.cache_dir.ends_with("veil/models"));
        assert!(config.bundled_dir.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ManagerConfig =
            serde_json::from_str(r#"{"cache_dir": "/tmp/veil", "idle_unload_after_secs": 5}"#)
                .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/veil"));
        assert_eq!(config.idle_unload_after(), Duration::from_secs(5));
        assert!(config.verify_checksums_on_startup);
        assert_eq!(config.model_dir("m1"), PathBuf::from("/tmp/veil/m1"));
    }
}
