//! Model lifecycle notifications and the buses that carry them.
//!
//! The model manager publishes; hosts subscribe to show download progress
//! or react when a model becomes usable.

mod bus;

pub use bus::{
    publish_json, BroadcastEventBus, EmittedEvent, EventBus, EventBusRef, InMemoryEventBus,
    NullEventBus,
};

use serde::{Deserialize, Serialize};

/// Lifecycle state of a model artifact as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStateDto {
    NotDownloaded,
    Downloading,
    Ready,
    Error,
}

/// Event emitted while an artifact transfer is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgressEvent {
    pub model_id: String,
    /// Fraction in `[0, 1]`, never decreasing within one download.
    pub progress: f64,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    /// File currently being transferred.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub ts_ms: Option<i64>,
}

/// Event emitted on every state transition of a model record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStateChangedEvent {
    pub model_id: String,
    pub state: ModelStateDto,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub ts_ms: Option<i64>,
}

/// Event emitted when a model is loaded into memory or unloaded from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResidencyEvent {
    pub model_id: String,
    pub loaded: bool,
    /// Why the model was unloaded ("memory_pressure", "explicit", "deleted").
    #[serde(default)]
    pub reason: Option<String>,
}

/// Topics published by the model manager.
pub mod event_names {
    /// Download progress for one model.
    pub const DOWNLOAD_PROGRESS: &str = "models:download_progress";
    /// Model record changed state.
    pub const STATE_CHANGED: &str = "models:state_changed";
    /// Model artifacts are verified and usable.
    pub const MODEL_READY: &str = "models:ready";
    /// Model loaded into or released from memory.
    pub const MODEL_RESIDENCY: &str = "models:residency";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_deserialize_minimal() {
        let json = r#"{"model_id": "m1", "progress": 0.5, "downloaded_bytes": 5, "total_bytes": 10}"#;
        let event: DownloadProgressEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.model_id, "m1");
        assert_eq!(event.file, None);
        assert_eq!(event.ts_ms, None);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let event = ModelStateChangedEvent {
            model_id: "m1".to_string(),
            state: ModelStateDto::NotDownloaded,
            error: None,
            ts_ms: Some(1),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"state\":\"not_downloaded\""));
    }
}
