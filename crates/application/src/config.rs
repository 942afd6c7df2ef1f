use crate::constants::*;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use veil_models::{PII_MODEL_ID, SENTIMENT_MODEL_ID};
use veil_patterns::{builtin_types, types, NEGATIVE, NEUTRAL, POSITIVE};

/// Options accepted by [`crate::PiiDetector::initialize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDetectionConfig {
    /// Catalog id of the token-classification model.
    pub model_id: String,
    pub enabled_types: Vec<String>,
    pub redaction_char: char,
    pub min_confidence: f32,
    /// Mask with `redaction_char` instead of `[TYPE]` labels.
    pub preserve_length: bool,
    /// Fail instead of falling back when the model cannot run.
    pub require_model: bool,
    /// Guess person/organization spans from capitalization when the model did not run.
    pub heuristic_fallback: bool,
    /// Extra rules, entity type to regex. Their types are always enabled.
    pub custom_patterns: BTreeMap<String, String>,
}

impl Default for EntityDetectionConfig {
    fn default() -> Self {
        let mut enabled_types: Vec<String> =
            builtin_types().into_iter().map(str::to_string).collect();
        enabled_types.extend(
            [types::PERSON, types::ORGANIZATION, types::LOCATION].map(str::to_string),
        );
        Self {
            model_id: PII_MODEL_ID.to_string(),
            enabled_types,
            redaction_char: DEFAULT_REDACTION_CHAR,
            min_confidence: DEFAULT_ENTITY_MIN_CONFIDENCE,
            preserve_length: false,
            require_model: false,
            heuristic_fallback: false,
            custom_patterns: BTreeMap::new(),
        }
    }
}

impl EntityDetectionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidInput(e.to_string()))
    }

    pub fn is_enabled(&self, entity_type: &str) -> bool {
        self.enabled_types.iter().any(|t| t == entity_type)
            || self.custom_patterns.contains_key(entity_type)
    }

    pub fn validate(&self) -> Result<()> {
        check_confidence(self.min_confidence)?;
        if self.model_id.is_empty() {
            return Err(PipelineError::InvalidInput("model_id is empty".into()));
        }
        if self.redaction_char.is_control() {
            return Err(PipelineError::InvalidInput(
                "redaction_char must be printable".into(),
            ));
        }
        Ok(())
    }
}

/// Options accepted by [`crate::SentimentAnalyzer::initialize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Catalog id of the sequence-classification model.
    pub model_id: String,
    /// Results below this confidence are reported as `default_label`.
    pub min_confidence: f32,
    pub default_label: String,
    pub enable_caching: bool,
    pub max_cache_size: usize,
    pub require_model: bool,
    /// Output taxonomy as `[negative, neutral, positive]`.
    pub labels: Vec<String>,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            model_id: SENTIMENT_MODEL_ID.to_string(),
            min_confidence: DEFAULT_SENTIMENT_MIN_CONFIDENCE,
            default_label: NEUTRAL.to_string(),
            enable_caching: true,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            require_model: false,
            labels: [NEGATIVE, NEUTRAL, POSITIVE].map(str::to_string).to_vec(),
        }
    }
}

impl SentimentConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidInput(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        check_confidence(self.min_confidence)?;
        if self.model_id.is_empty() {
            return Err(PipelineError::InvalidInput("model_id is empty".into()));
        }
        if self.labels.len() != 3 {
            return Err(PipelineError::InvalidInput(format!(
                "expected 3 labels (negative, neutral, positive), got {}",
                self.labels.len()
            )));
        }
        if self.default_label.is_empty() {
            return Err(PipelineError::InvalidInput("default_label is empty".into()));
        }
        Ok(())
    }

    pub(crate) fn label_triplet(&self) -> [&str; 3] {
        [
            self.labels[0].as_str(),
            self.labels[1].as_str(),
            self.labels[2].as_str(),
        ]
    }
}

fn check_confidence(value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::InvalidInput(format!(
            "min_confidence must be within [0, 1], got {value}"
        )))
    }
}
