//! ONNX Runtime implementation of the inference boundary.

use crate::{InferenceEngine, InferenceError, InferenceSession, RawOutput, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

/// Creates [`OnnxSession`]s for BERT-style classifiers.
#[derive(Debug, Clone)]
pub struct OnnxEngine {
    intra_threads: usize,
}

impl OnnxEngine {
    pub fn new() -> Self {
        Self { intra_threads: 1 }
    }

    pub fn with_intra_threads(intra_threads: usize) -> Self {
        Self {
            intra_threads: intra_threads.max(1),
        }
    }
}

impl Default for OnnxEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceEngine for OnnxEngine {
    fn name(&self) -> &str {
        "onnxruntime"
    }

    fn load_session(&self, model_path: &Path) -> Result<Box<dyn InferenceSession>> {
        Ok(Box::new(OnnxSession::load(model_path, self.intra_threads)?))
    }
}

#[derive(Debug)]
pub struct OnnxSession {
    session: Mutex<Session>,
    input_ids_name: String,
    attention_mask_name: String,
    token_type_ids_name: Option<String>,
    output_name: String,
}

impl OnnxSession {
    pub fn load(model_path: impl AsRef<Path>, intra_threads: usize) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| InferenceError::Model(e.to_string()))?
            .with_intra_threads(intra_threads)
            .map_err(|e| InferenceError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Model(e.to_string()))?
            .commit_from_file(model_path.as_ref())
            .map_err(|e| InferenceError::Model(e.to_string()))?;

        let find_input = |wanted: &str| {
            session
                .inputs
                .iter()
                .find(|i| i.name == wanted)
                .map(|i| i.name.clone())
        };

        let input_ids_name = find_input("input_ids")
            .or_else(|| session.inputs.first().map(|i| i.name.clone()))
            .ok_or_else(|| InferenceError::Model("model has no inputs".to_string()))?;
        let attention_mask_name = find_input("attention_mask")
            .or_else(|| session.inputs.get(1).map(|i| i.name.clone()))
            .ok_or_else(|| {
                InferenceError::Model("model has no attention mask input".to_string())
            })?;
        let token_type_ids_name = find_input("token_type_ids");

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name == "logits")
            .map(|o| o.name.clone())
            .or_else(|| session.outputs.first().map(|o| o.name.clone()))
            .ok_or_else(|| InferenceError::Model("model has no outputs".to_string()))?;

        tracing::info!(
            path = ?model_path.as_ref(),
            input_ids = %input_ids_name,
            attention_mask = %attention_mask_name,
            token_type_ids = ?token_type_ids_name,
            output = %output_name,
            "ONNX session loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_ids_name,
            attention_mask_name,
            token_type_ids_name,
            output_name,
        })
    }
}

impl InferenceSession for OnnxSession {
    fn run(&self, input_ids: &[i64], attention_mask: &[i64]) -> Result<RawOutput> {
        if input_ids.len() != attention_mask.len() {
            return Err(InferenceError::ShapeMismatch(format!(
                "input_ids has {} values but attention_mask has {}",
                input_ids.len(),
                attention_mask.len()
            )));
        }
        let seq_len = input_ids.len();

        let ids = Tensor::<i64>::from_array(([1usize, seq_len], input_ids.to_vec()))
            .map_err(|e| InferenceError::InferenceFailure(e.to_string()))?;
        let mask = Tensor::<i64>::from_array(([1usize, seq_len], attention_mask.to_vec()))
            .map_err(|e| InferenceError::InferenceFailure(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::InferenceFailure("lock poisoned".to_string()))?;

        let outputs = match &self.token_type_ids_name {
            Some(token_type_ids_name) => {
                let types = Tensor::<i64>::from_array(([1usize, seq_len], vec![0i64; seq_len]))
                    .map_err(|e| InferenceError::InferenceFailure(e.to_string()))?;
                session.run(ort::inputs![
                    self.input_ids_name.as_str() => ids,
                    self.attention_mask_name.as_str() => mask,
                    token_type_ids_name.as_str() => types
                ])
            }
            None => session.run(ort::inputs![
                self.input_ids_name.as_str() => ids,
                self.attention_mask_name.as_str() => mask
            ]),
        }
        .map_err(|e| InferenceError::InferenceFailure(e.to_string()))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| InferenceError::InferenceFailure("missing model output".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::InferenceFailure(e.to_string()))?;

        Ok(RawOutput {
            shape: shape.iter().map(|&d| d.max(0) as usize).collect(),
            data: data.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file_is_a_load_error() {
        let err = OnnxEngine::new()
            .load_session(Path::new("/nonexistent/model.onnx"))
            .err()
            .unwrap();
        assert!(matches!(err, InferenceError::Model(_)));
    }
}
