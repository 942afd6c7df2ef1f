//! Narrow boundary over a tensor inference engine.
//!
//! The rest of the workspace only sees [`InferenceEngine`] and
//! [`InferenceSession`]; the ONNX Runtime implementation lives in [`onnx`].
//! Engine-level failures are returned as errors and never panic the caller.

mod adapter;
pub mod onnx;
pub mod testing;

use std::path::Path;

pub use adapter::{run_sequence_classification, run_token_classification};
pub use onnx::{OnnxEngine, OnnxSession};

#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error("failed to load model: {0}")]
    Model(String),
    #[error("inference failed: {0}")]
    InferenceFailure(String),
    #[error("unexpected output shape: {0}")]
    ShapeMismatch(String),
}

pub type Result<T> = std::result::Result<T, InferenceError>;

/// Raw, non-normalized scores returned by one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    /// Output dimensions as reported by the engine (may be empty if unknown).
    pub shape: Vec<usize>,
    /// Row-major scores.
    pub data: Vec<f32>,
}

/// A loaded model that can run forward passes.
pub trait InferenceSession: Send + Sync {
    /// Run the model on a single `[1, seq_len]` batch.
    fn run(&self, input_ids: &[i64], attention_mask: &[i64]) -> Result<RawOutput>;
}

/// Factory for sessions, one per model artifact.
pub trait InferenceEngine: Send + Sync {
    fn name(&self) -> &str;

    fn load_session(&self, model_path: &Path) -> Result<Box<dyn InferenceSession>>;
}
