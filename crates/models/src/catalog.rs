//! Static description of the models the manager knows about.

use crate::{ModelError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// One label per token (entity detection).
    TokenClassification,
    /// One label per input (sentiment).
    SequenceClassification,
}

/// Immutable description of one downloadable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub kind: ModelKind,
    /// Expected byte size of the model artifact, when known ahead of metadata.
    #[serde(default)]
    pub size_bytes: Option<u64>,
    /// Expected SHA-256 (lowercase hex) of the model artifact.
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_vocab_file_name")]
    pub vocab_file_name: String,
    /// Output labels in logit order.
    pub labels: Vec<String>,
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
    #[serde(default)]
    pub do_lower_case: bool,
}

fn default_file_name() -> String {
    "model.onnx".to_string()
}

fn default_vocab_file_name() -> String {
    "vocab.txt".to_string()
}

fn default_max_sequence_length() -> usize {
    128
}

impl ModelDescriptor {
    /// Files fetched for this model, artifact first.
    pub fn files(&self) -> [&str; 2] {
        [&self.file_name, &self.vocab_file_name]
    }
}

/// Id of the built-in entity-detection model.
pub const PII_MODEL_ID: &str = "pii-ner-small";

/// Id of the built-in sentiment model.
pub const SENTIMENT_MODEL_ID: &str = "sentiment-small";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    models: Vec<ModelDescriptor>,
}

impl Catalog {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    /// Parse a catalog from a JSON document (`{"models": [...]}`).
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ModelError::Io(format!("invalid catalog: {e}")))
    }

    /// The two models shipped with the default configuration.
    pub fn builtin() -> Self {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self::new(vec![
            ModelDescriptor {
                id: PII_MODEL_ID.to_string(),
                display_name: "PII entity recognizer (small)".to_string(),
                kind: ModelKind::TokenClassification,
                size_bytes: None,
                checksum: None,
                file_name: default_file_name(),
                vocab_file_name: default_vocab_file_name(),
                labels: strings(&[
                    "O",
                    "B-person",
                    "I-person",
                    "B-organization",
                    "I-organization",
                    "B-location",
                    "I-location",
                ]),
                max_sequence_length: 128,
                do_lower_case: false,
            },
            ModelDescriptor {
                id: SENTIMENT_MODEL_ID.to_string(),
                display_name: "Sentiment classifier (small)".to_string(),
                kind: ModelKind::SequenceClassification,
                size_bytes: None,
                checksum: None,
                file_name: default_file_name(),
                vocab_file_name: default_vocab_file_name(),
                labels: strings(&["negative", "positive"]),
                max_sequence_length: 128,
                do_lower_case: true,
            },
        ])
    }

    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&ModelDescriptor> {
        self.get(id)
            .ok_or_else(|| ModelError::UnknownModel(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), 2);
        let pii = catalog.require(PII_MODEL_ID).unwrap();
        assert_eq!(pii.kind, ModelKind::TokenClassification);
        assert_eq!(pii.files(), ["model.onnx", "vocab.txt"]);
        assert!(matches!(
            catalog.require("missing"),
            Err(ModelError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let json = r#"{"models": [{
            "id": "m1",
            "display_name": "Test",
            "kind": "sequence_classification",
            "size_bytes": 2048,
            "labels": ["negative", "positive"]
        }]}"#;
        let catalog = Catalog::from_json(json).unwrap();
        let m1 = catalog.get("m1").unwrap();
        assert_eq!(m1.file_name, "model.onnx");
        assert_eq!(m1.vocab_file_name, "vocab.txt");
        assert_eq!(m1.max_sequence_length, 128);
        assert_eq!(m1.size_bytes, Some(2048));
        assert!(m1.checksum.is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(Catalog::from_json("{not json").is_err());
    }
}
