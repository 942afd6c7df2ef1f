//! In-memory artifact source for tests and offline demos.

use crate::{ArtifactMetadata, ArtifactSource, ArtifactStream, ModelError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_CHUNK_SIZE: usize = 512;

#[derive(Debug, Clone)]
struct StoredArtifact {
    model_id: String,
    meta: ArtifactMetadata,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    /// Keyed by `(model_id, file_name)`.
    artifacts: HashMap<(String, String), StoredArtifact>,
    /// Artifact transfers started, per model.
    fetches: HashMap<String, usize>,
}

/// Serves artifacts registered with [`MemorySource::add_file`].
///
/// Metadata is derived from the bytes (size and SHA-256) and can be
/// overridden to simulate a lying server.
#[derive(Debug)]
pub struct MemorySource {
    state: Mutex<State>,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: None,
        }
    }

    /// Sleep this long before every chunk, to keep transfers in flight.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_file(&self, model_id: &str, file_name: &str, bytes: Vec<u8>) {
        let checksum = format!("{:x}", Sha256::digest(&bytes));
        let meta = ArtifactMetadata {
            size_bytes: bytes.len() as u64,
            checksum: Some(checksum),
            format: "onnx".to_string(),
            url: format!("mem://{model_id}/{file_name}"),
        };
        self.lock().artifacts.insert(
            (model_id.to_string(), file_name.to_string()),
            StoredArtifact {
                model_id: model_id.to_string(),
                meta,
                bytes,
            },
        );
    }

    /// Register `model.onnx` and `vocab.txt` for `model_id`.
    pub fn add_model(&self, model_id: &str, artifact: Vec<u8>, vocab: Vec<u8>) {
        self.add_file(model_id, "model.onnx", artifact);
        self.add_file(model_id, "vocab.txt", vocab);
    }

    pub fn override_size(&self, model_id: &str, file_name: &str, size_bytes: u64) {
        if let Some(a) = self
            .lock()
            .artifacts
            .get_mut(&(model_id.to_string(), file_name.to_string()))
        {
            a.meta.size_bytes = size_bytes;
        }
    }

    pub fn override_checksum(&self, model_id: &str, file_name: &str, checksum: Option<String>) {
        if let Some(a) = self
            .lock()
            .artifacts
            .get_mut(&(model_id.to_string(), file_name.to_string()))
        {
            a.meta.checksum = checksum;
        }
    }

    /// Number of artifact transfers opened for `model_id`.
    pub fn fetch_count(&self, model_id: &str) -> usize {
        self.lock().fetches.get(model_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ArtifactSource for MemorySource {
    async fn fetch_metadata(&self, model_id: &str, file_name: &str) -> Result<ArtifactMetadata> {
        self.lock()
            .artifacts
            .get(&(model_id.to_string(), file_name.to_string()))
            .map(|a| a.meta.clone())
            .ok_or_else(|| ModelError::Network(format!("HTTP 404: {model_id}/{file_name}")))
    }

    async fn open_artifact(&self, url: &str) -> Result<ArtifactStream> {
        let artifact = {
            let mut state = self.lock();
            let artifact = state
                .artifacts
                .values()
                .find(|a| a.meta.url == url)
                .cloned()
                .ok_or_else(|| ModelError::Network(format!("HTTP 404: {url}")))?;
            *state.fetches.entry(artifact.model_id.clone()).or_default() += 1;
            artifact
        };

        let chunks: Vec<Vec<u8>> = artifact
            .bytes
            .chunks(self.chunk_size)
            .map(<[u8]>::to_vec)
            .collect();
        let delay = self.chunk_delay;

        Ok(futures::stream::iter(chunks)
            .then(move |chunk| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(chunk)
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_registered_bytes_in_chunks() {
        let source = MemorySource::new().with_chunk_size(100);
        source.add_file("m1", "model.onnx", vec![5u8; 250]);

        let meta = source.fetch_metadata("m1", "model.onnx").await.unwrap();
        assert_eq!(meta.size_bytes, 250);

        let chunks: Vec<Vec<u8>> = source
            .open_artifact(&meta.url)
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![100, 100, 50]);
        assert_eq!(source.fetch_count("m1"), 1);
    }

    #[tokio::test]
    async fn test_unknown_file_is_network_error() {
        let source = MemorySource::new();
        let err = source.fetch_metadata("m1", "model.onnx").await.unwrap_err();
        assert!(matches!(err, ModelError::Network(_)));
    }
}
