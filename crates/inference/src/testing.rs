//! Scripted engine for tests and offline demos.
//!
//! Sessions answer every forward pass with a caller-supplied function, so
//! pipelines can be exercised without real model weights.

use crate::{InferenceEngine, InferenceError, InferenceSession, RawOutput, Result};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type RunFn = Arc<dyn Fn(&[i64], &[i64]) -> Result<RawOutput> + Send + Sync>;

pub struct ScriptedEngine {
    run: RunFn,
    loads: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&[i64], &[i64]) -> Result<RawOutput> + Send + Sync + 'static,
    {
        Self {
            run: Arc::new(run),
            loads: AtomicUsize::new(0),
        }
    }

    /// Every pass returns `data` as a `[1, len]` tensor.
    pub fn constant(data: Vec<f32>) -> Self {
        Self::new(move |_, _| {
            Ok(RawOutput {
                shape: vec![1, data.len()],
                data: data.clone(),
            })
        })
    }

    /// Every pass fails with `InferenceFailure(message)`.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_, _| Err(InferenceError::InferenceFailure(message.clone())))
    }

    /// Number of sessions created so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl InferenceEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn load_session(&self, model_path: &Path) -> Result<Box<dyn InferenceSession>> {
        if !model_path.is_file() {
            return Err(InferenceError::Model(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            run: Arc::clone(&self.run),
        }))
    }
}

struct ScriptedSession {
    run: RunFn,
}

impl InferenceSession for ScriptedSession {
    fn run(&self, input_ids: &[i64], attention_mask: &[i64]) -> Result<RawOutput> {
        (self.run)(input_ids, attention_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_requires_file() {
        let engine = ScriptedEngine::constant(vec![1.0]);
        assert!(engine.load_session(Path::new("/nonexistent/model.onnx")).is_err());
        assert_eq!(engine.load_count(), 0);
    }

    #[test]
    fn test_sessions_share_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"weights").unwrap();

        let engine = ScriptedEngine::constant(vec![2.0, 0.0]);
        let session = engine.load_session(&path).unwrap();
        assert_eq!(session.run(&[101, 102], &[1, 1]).unwrap().data, vec![2.0, 0.0]);
        assert_eq!(engine.load_count(), 1);
    }
}
