use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use veil_inference::InferenceError;
use veil_models::ModelError;
use veil_patterns::PatternError;
use veil_tokenizer::TokenizerError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("service not initialized")]
    NotInitialized,

    #[error("model {model} is not ready; required for: {}", required_types.join(", "))]
    ModelNotReady {
        model: String,
        required_types: Vec<String>,
    },

    #[error("download integrity failure: {0}")]
    DownloadIntegrityFailure(String),

    #[error("{0}")]
    InvalidPattern(String),

    #[error("inference failure: {0}")]
    InferenceFailure(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model error: {0}")]
    Model(String),
}

impl PipelineError {
    /// Stable identifier of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NotInitialized => "NotInitialized",
            PipelineError::ModelNotReady { .. } => "ModelNotReady",
            PipelineError::DownloadIntegrityFailure(_) => "DownloadIntegrityFailure",
            PipelineError::InvalidPattern(_) => "InvalidPattern",
            PipelineError::InferenceFailure(_) => "InferenceFailure",
            PipelineError::InvalidInput(_) => "InvalidInput",
            PipelineError::Model(_) => "Model",
        }
    }

    /// Map a lifecycle error, naming the types that needed the model.
    pub(crate) fn from_model(err: ModelError, required_types: &[String]) -> Self {
        match err {
            ModelError::NotDownloaded(model) => PipelineError::ModelNotReady {
                model,
                required_types: required_types.to_vec(),
            },
            other => other.into(),
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("PipelineError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

impl From<ModelError> for PipelineError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Integrity { .. } => PipelineError::DownloadIntegrityFailure(e.to_string()),
            ModelError::NotDownloaded(model) => PipelineError::ModelNotReady {
                model,
                required_types: Vec::new(),
            },
            other => PipelineError::Model(other.to_string()),
        }
    }
}

impl From<PatternError> for PipelineError {
    fn from(e: PatternError) -> Self {
        PipelineError::InvalidPattern(e.to_string())
    }
}

impl From<InferenceError> for PipelineError {
    fn from(e: InferenceError) -> Self {
        PipelineError::InferenceFailure(e.to_string())
    }
}

impl From<TokenizerError> for PipelineError {
    fn from(e: TokenizerError) -> Self {
        PipelineError::InferenceFailure(e.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        PipelineError::InferenceFailure(format!("inference task failed: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_kind_and_message() {
        let err = PipelineError::ModelNotReady {
            model: "pii-ner-small".into(),
            required_types: vec!["person".into(), "location".into()],
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "ModelNotReady");
        assert_eq!(
            json["message"],
            "model pii-ner-small is not ready; required for: person, location"
        );
    }

    #[test]
    fn test_integrity_maps_to_download_integrity_failure() {
        let err: PipelineError = ModelError::Integrity {
            model: "m".into(),
            reason: "size mismatch".into(),
        }
        .into();
        assert_eq!(err.kind(), "DownloadIntegrityFailure");
    }

    #[test]
    fn test_not_downloaded_names_required_types() {
        let err = PipelineError::from_model(
            ModelError::NotDownloaded("m".into()),
            &["person".to_string()],
        );
        match err {
            PipelineError::ModelNotReady { model, required_types } => {
                assert_eq!(model, "m");
                assert_eq!(required_types, vec!["person"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
