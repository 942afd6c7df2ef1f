#![allow(dead_code)]

use std::sync::Arc;
use veil_events::NullEventBus;
use veil_inference::testing::ScriptedEngine;
use veil_inference::RawOutput;
use veil_models::testing::MemorySource;
use veil_models::{Catalog, ManagerConfig, ModelManager, PII_MODEL_ID, SENTIMENT_MODEL_ID};

pub const PII_LABELS: usize = 7;
pub const JOHN_ID: i64 = 4;
pub const SMITH_ID: i64 = 5;
pub const BOOM_ID: i64 = 4;

pub const SCENARIO_TEXT: &str = "Contact John Smith at john@example.com or call 555-123-4567.";

/// Specials, then `words`, then filler up past the minimum artifact size.
pub fn vocab_bytes(words: &[&str]) -> Vec<u8> {
    let mut lines: Vec<String> = ["[PAD]", "[UNK]", "[CLS]", "[SEP]"]
        .iter()
        .chain(words)
        .map(|s| s.to_string())
        .collect();
    lines.extend((0..300).map(|i| format!("filler{i}")));
    lines.join("\n").into_bytes()
}

/// Labels `John` as B-person and `Smith` as I-person, everything else O.
pub fn pii_engine() -> ScriptedEngine {
    ScriptedEngine::new(|ids, _mask| {
        let mut data = Vec::with_capacity(ids.len() * PII_LABELS);
        for &id in ids {
            let mut row = [0.0f32; PII_LABELS];
            let hot = match id {
                JOHN_ID => 1,
                SMITH_ID => 2,
                _ => 0,
            };
            row[hot] = 5.0;
            data.extend_from_slice(&row);
        }
        Ok(RawOutput {
            shape: vec![1, ids.len(), PII_LABELS],
            data,
        })
    })
}

pub struct Harness {
    _tmp: tempfile::TempDir,
    pub source: Arc<MemorySource>,
    pub engine: Arc<ScriptedEngine>,
    pub manager: ModelManager,
}

impl Harness {
    pub fn new(engine: ScriptedEngine) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let source = Arc::new(MemorySource::new());
        let engine = Arc::new(engine);
        let manager = ModelManager::new(
            ManagerConfig::with_cache_dir(tmp.path().join("models")),
            Catalog::builtin(),
            source.clone(),
            engine.clone(),
            Arc::new(NullEventBus),
        );
        Self {
            _tmp: tmp,
            source,
            engine,
            manager,
        }
    }

    /// Publish the PII model and download it into the cache.
    pub async fn with_pii_model(self) -> Self {
        self.source.add_model(
            PII_MODEL_ID,
            vec![7u8; 4096],
            vocab_bytes(&["John", "Smith"]),
        );
        self.manager.download(PII_MODEL_ID).await.unwrap();
        self
    }

    /// Publish the sentiment model and download it into the cache.
    pub async fn with_sentiment_model(self) -> Self {
        self.source
            .add_model(SENTIMENT_MODEL_ID, vec![7u8; 4096], vocab_bytes(&["boom"]));
        self.manager.download(SENTIMENT_MODEL_ID).await.unwrap();
        self
    }
}
