use crate::{ModelDescriptor, ModelError, Result};
use std::path::Path;
use veil_inference::{InferenceEngine, InferenceSession};
use veil_tokenizer::{Vocab, WordPieceTokenizer};

/// Tokenizer and inference session for one `Ready` model.
///
/// Handed out as `Arc<LoadedModel>`; the session is released when the
/// manager has unloaded it and the last in-flight call drops its handle.
pub struct LoadedModel {
    descriptor: ModelDescriptor,
    tokenizer: WordPieceTokenizer,
    session: Box<dyn InferenceSession>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("id", &self.descriptor.id)
            .field("vocab_size", &self.tokenizer.vocab().len())
            .finish_non_exhaustive()
    }
}

impl LoadedModel {
    /// Build the tokenizer and session from a verified cache directory.
    ///
    /// Blocking: reads the vocabulary and initializes the engine session.
    pub fn load(
        descriptor: &ModelDescriptor,
        dir: &Path,
        engine: &dyn InferenceEngine,
    ) -> Result<Self> {
        let load_failed = |reason: String| ModelError::LoadFailed {
            model: descriptor.id.clone(),
            reason,
        };

        let vocab = Vocab::from_file(dir.join(&descriptor.vocab_file_name))
            .map_err(|e| load_failed(e.to_string()))?;
        let tokenizer = WordPieceTokenizer::new(vocab, descriptor.do_lower_case);
        let session = engine
            .load_session(&dir.join(&descriptor.file_name))
            .map_err(|e| load_failed(e.to_string()))?;

        tracing::info!(
            model = %descriptor.id,
            engine = engine.name(),
            vocab_size = tokenizer.vocab().len(),
            "Model loaded"
        );

        Ok(Self {
            descriptor: descriptor.clone(),
            tokenizer,
            session,
        })
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn labels(&self) -> &[String] {
        &self.descriptor.labels
    }

    pub fn max_sequence_length(&self) -> usize {
        self.descriptor.max_sequence_length
    }

    pub fn tokenizer(&self) -> &WordPieceTokenizer {
        &self.tokenizer
    }

    pub fn session(&self) -> &dyn InferenceSession {
        self.session.as_ref()
    }
}
