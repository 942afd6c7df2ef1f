//! Where artifacts come from.

use crate::{ModelError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// Chunks of one artifact as they arrive.
pub type ArtifactStream = BoxStream<'static, Result<Vec<u8>>>;

/// Small document fetched before the artifact itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub size_bytes: u64,
    /// SHA-256, lowercase hex.
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub format: String,
    /// Location passed back to [`ArtifactSource::open_artifact`].
    pub url: String,
}

/// Remote (or local) store of model artifacts.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn fetch_metadata(&self, model_id: &str, file_name: &str) -> Result<ArtifactMetadata>;

    async fn open_artifact(&self, url: &str) -> Result<ArtifactStream>;
}

/// Serves `<base_url>/<model_id>/<file_name>.json` metadata documents whose
/// `url` fields point at the artifacts.
#[derive(Debug, Clone)]
pub struct HttpArtifactSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpArtifactSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn metadata_url(&self, model_id: &str, file_name: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, model_id, file_name)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, concat!("veil/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ModelError::Network(format!(
                "HTTP {}: {}",
                resp.status(),
                url
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch_metadata(&self, model_id: &str, file_name: &str) -> Result<ArtifactMetadata> {
        let url = self.metadata_url(model_id, file_name);
        tracing::debug!(model = model_id, file = file_name, url = %url, "Fetching artifact metadata");

        self.get(&url)
            .await?
            .json::<ArtifactMetadata>()
            .await
            .map_err(|e| ModelError::Network(format!("invalid metadata at {url}: {e}")))
    }

    async fn open_artifact(&self, url: &str) -> Result<ArtifactStream> {
        tracing::info!(url = %url, "Downloading artifact");
        let resp = self.get(url).await?;
        Ok(resp
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| ModelError::Network(e.to_string()))
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_url_layout() {
        let source = HttpArtifactSource::new("https://models.example.com/v1/");
        assert_eq!(
            source.metadata_url("pii-ner-small", "model.onnx"),
            "https://models.example.com/v1/pii-ner-small/model.onnx.json"
        );
    }

    #[test]
    fn test_metadata_document_parses() {
        let meta: ArtifactMetadata = serde_json::from_str(
            r#"{"size_bytes": 4096, "checksum": "abc", "format": "onnx", "url": "https://x/y"}"#,
        )
        .unwrap();
        assert_eq!(meta.size_bytes, 4096);
        assert_eq!(meta.checksum.as_deref(), Some("abc"));

        let minimal: ArtifactMetadata =
            serde_json::from_str(r#"{"size_bytes": 10, "url": "u"}"#).unwrap();
        assert!(minimal.checksum.is_none());
        assert!(minimal.format.is_empty());
    }
}
