//! Model lifecycle: catalog, verified download into a local cache, and
//! load/unload of in-memory sessions.
//!
//! Disk state follows `NotDownloaded -> Downloading -> Ready | Error`.
//! Memory residency is tracked separately: a `Ready` model may be unloaded
//! under memory pressure and reloaded on the next [`ModelManager::acquire`].

mod catalog;
mod config;
mod download;
mod loaded;
mod manager;
mod pressure;
mod progress;
mod source;
pub mod testing;
mod tracker;

use std::path::PathBuf;

pub use catalog::{Catalog, ModelDescriptor, ModelKind, PII_MODEL_ID, SENTIMENT_MODEL_ID};
pub use config::ManagerConfig;
pub use download::{sha256_file, MIN_ARTIFACT_BYTES};
pub use loaded::LoadedModel;
pub use manager::{ModelInfo, ModelManager, ModelRecord, ModelState};
pub use pressure::MemoryPressure;
pub use progress::ProgressThrottle;
pub use source::{ArtifactMetadata, ArtifactSource, ArtifactStream, HttpArtifactSource};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("download failed for {model}: {reason}")]
    DownloadFailed { model: String, reason: String },
    #[error("integrity check failed for {model}: {reason}")]
    Integrity { model: String, reason: String },
    #[error("download cancelled: {0}")]
    Cancelled(String),
    #[error("load failed for {model}: {reason}")]
    LoadFailed { model: String, reason: String },
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ModelError {
    fn from(e: std::io::Error) -> Self {
        ModelError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Default cache root: `<data_local_dir>/veil/models`.
pub fn default_cache_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("veil")
        .join("models")
}
