use crate::config::EntityDetectionConfig;
use crate::constants::MAX_BATCH_SIZE;
use crate::error::{PipelineError, Result};
use crate::stats::{Outcome, ServiceStats, StatsRecorder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use veil_decode::{
    decode_token_classification, normalize_label, redact, resolve_overlaps, Entity,
    RedactionStyle,
};
use veil_inference::run_token_classification;
use veil_models::{LoadedModel, ModelManager};
use veil_patterns::{CapitalizedSequenceDetector, HeuristicDetector, PatternEngine};

/// Output of [`PiiDetector::redact`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionResult {
    pub redacted_text: String,
    pub entities: Vec<Entity>,
}

struct DetectorState {
    config: EntityDetectionConfig,
    patterns: PatternEngine,
    /// Entity types the configured model can label.
    model_types: Vec<String>,
}

impl DetectorState {
    /// Enabled types only the model (or the heuristic) can find.
    fn model_required_types(&self) -> Vec<String> {
        self.model_types
            .iter()
            .filter(|t| self.config.is_enabled(t))
            .cloned()
            .collect()
    }
}

/// Entity detection and redaction.
///
/// Combines token-classification output, regex rules and (optionally) the
/// capitalization heuristic, then keeps the first of any overlapping spans.
pub struct PiiDetector {
    models: ModelManager,
    heuristic: Box<dyn HeuristicDetector>,
    state: RwLock<Option<DetectorState>>,
    stats: StatsRecorder,
}

impl PiiDetector {
    pub fn new(models: ModelManager) -> Self {
        Self::with_heuristic(models, Box::new(CapitalizedSequenceDetector::new()))
    }

    pub fn with_heuristic(models: ModelManager, heuristic: Box<dyn HeuristicDetector>) -> Self {
        Self {
            models,
            heuristic,
            state: RwLock::new(None),
            stats: StatsRecorder::new(),
        }
    }

    /// Apply `config`, replacing any previous configuration.
    ///
    /// Custom patterns are compiled here; an invalid one fails the whole call.
    /// With `require_model`, the model must be available locally.
    pub async fn initialize(&self, config: EntityDetectionConfig) -> Result<()> {
        config.validate()?;

        let descriptor = self.models.descriptor(&config.model_id)?;
        let mut model_types: Vec<String> = descriptor
            .labels
            .iter()
            .filter_map(|l| normalize_label(l))
            .map(str::to_string)
            .collect();
        model_types.sort();
        model_types.dedup();

        let mut patterns = PatternEngine::new();
        for (entity_type, pattern) in &config.custom_patterns {
            patterns.register(entity_type, pattern)?;
        }

        let state = DetectorState {
            config,
            patterns,
            model_types,
        };

        if state.config.require_model {
            let required = state.model_required_types();
            self.models
                .acquire(&state.config.model_id)
                .await
                .map_err(|e| PipelineError::from_model(e, &required))?;
        }

        tracing::info!(
            model = %state.config.model_id,
            enabled = state.config.enabled_types.len(),
            custom = state.config.custom_patterns.len(),
            require_model = state.config.require_model,
            "Entity detection initialized"
        );
        *self.state.write().await = Some(state);
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Drop the configuration and release the model.
    pub async fn shutdown(&self) {
        if let Some(state) = self.state.write().await.take() {
            self.models.unload(&state.config.model_id).await;
            tracing::info!(model = %state.config.model_id, "Entity detection shut down");
        }
    }

    pub async fn config(&self) -> Result<EntityDetectionConfig> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(PipelineError::NotInitialized)?;
        Ok(state.config.clone())
    }

    /// Non-overlapping entities of `text`, sorted by start offset.
    pub async fn detect(&self, text: &str) -> Result<Vec<Entity>> {
        let started = Instant::now();
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(PipelineError::NotInitialized)?;

        match self.detect_with(state, text).await {
            Ok((entities, outcome)) => {
                self.stats.record(outcome, started.elapsed());
                Ok(entities)
            }
            Err(e) => {
                self.stats.record(Outcome::Error, started.elapsed());
                Err(e)
            }
        }
    }

    async fn detect_with(
        &self,
        state: &DetectorState,
        text: &str,
    ) -> Result<(Vec<Entity>, Outcome)> {
        let config = &state.config;
        if text.trim().is_empty() {
            return Ok((Vec::new(), Outcome::Fallback));
        }

        let mut candidates = Vec::new();
        let mut model_ran = false;

        let required = state.model_required_types();
        if !required.is_empty() {
            match self.run_model(&config.model_id, text, &required).await {
                Ok(entities) => {
                    candidates.extend(entities);
                    model_ran = true;
                }
                Err(e) if config.require_model => return Err(e),
                Err(e @ PipelineError::DownloadIntegrityFailure(_)) => return Err(e),
                Err(PipelineError::ModelNotReady { model, .. }) => {
                    tracing::debug!(model = %model, "Model not ready, using patterns only");
                }
                Err(e) => {
                    tracing::warn!(model = %config.model_id, error = %e, "Model inference failed, falling back");
                }
            }
        }

        let is_enabled = |t: &str| config.is_enabled(t);
        candidates.extend(state.patterns.detect(text, is_enabled));
        if !model_ran && config.heuristic_fallback {
            candidates.extend(self.heuristic.detect(text, &is_enabled));
        }

        candidates.retain(|e| e.confidence >= config.min_confidence);
        let entities = resolve_overlaps(candidates);

        tracing::debug!(
            chars = text.chars().count(),
            entities = entities.len(),
            model_ran,
            "Entities detected"
        );
        let outcome = if model_ran {
            Outcome::Model
        } else {
            Outcome::Fallback
        };
        Ok((entities, outcome))
    }

    async fn run_model(
        &self,
        model_id: &str,
        text: &str,
        required: &[String],
    ) -> Result<Vec<Entity>> {
        let model: Arc<LoadedModel> = self
            .models
            .acquire(model_id)
            .await
            .map_err(|e| PipelineError::from_model(e, required))?;

        let text = text.to_string();
        let wanted = required.to_vec();
        let entities = tokio::task::spawn_blocking(move || -> Result<Vec<Entity>> {
            let tokenized =
                model
                    .tokenizer()
                    .tokenize(&text, model.max_sequence_length(), true)?;
            let logits =
                run_token_classification(model.session(), &tokenized, model.labels().len())?;
            Ok(decode_token_classification(
                &text,
                &tokenized,
                &logits,
                model.labels(),
                |t| wanted.iter().any(|w| w == t),
            ))
        })
        .await??;

        self.models.mark_used(model_id).await;
        Ok(entities)
    }

    /// Detect entities and replace them in `text`.
    ///
    /// With `preserve_length` every char is masked with `redaction_char`;
    /// otherwise each span becomes `[TYPE]`.
    pub async fn redact(&self, text: &str) -> Result<RedactionResult> {
        let entities = self.detect(text).await?;
        let style = {
            let guard = self.state.read().await;
            let config = &guard.as_ref().ok_or(PipelineError::NotInitialized)?.config;
            if config.preserve_length {
                RedactionStyle::Mask(config.redaction_char)
            } else {
                RedactionStyle::Label
            }
        };
        Ok(RedactionResult {
            redacted_text: redact(text, &entities, style),
            entities,
        })
    }

    /// Detect entities in every text concurrently.
    ///
    /// The batch as a whole fails only when it is too large or the service is
    /// not initialized; each item carries its own result.
    pub async fn detect_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
    ) -> Result<Vec<Result<Vec<Entity>>>> {
        check_batch(texts.len())?;
        if !self.is_initialized().await {
            return Err(PipelineError::NotInitialized);
        }
        Ok(futures::future::join_all(texts.iter().map(|t| self.detect(t.as_ref()))).await)
    }

    /// Add a custom rule at runtime, replacing any earlier custom rule for
    /// the same type. Its type becomes enabled.
    pub async fn register_pattern(&self, entity_type: &str, pattern: &str) -> Result<()> {
        let entity_type = entity_type.trim();
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(PipelineError::NotInitialized)?;
        PatternEngine::empty().register(entity_type, pattern)?;
        state.patterns.remove_custom(entity_type);
        state.patterns.register(entity_type, pattern)?;
        state
            .config
            .custom_patterns
            .insert(entity_type.to_string(), pattern.to_string());
        tracing::info!(entity_type, "Custom pattern registered");
        Ok(())
    }

    /// Remove the custom rules for `entity_type`. Built-in rules stay.
    pub async fn remove_pattern(&self, entity_type: &str) -> Result<bool> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(PipelineError::NotInitialized)?;
        let removed = state.patterns.remove_custom(entity_type) > 0;
        state.config.custom_patterns.remove(entity_type);
        if removed {
            tracing::info!(entity_type, "Custom pattern removed");
        }
        Ok(removed)
    }

    /// Every entity type this detector can currently produce.
    pub async fn supported_types(&self) -> Result<Vec<String>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(PipelineError::NotInitialized)?;
        let mut types: Vec<String> = state
            .patterns
            .supported_types()
            .into_iter()
            .map(str::to_string)
            .chain(state.model_types.iter().cloned())
            .collect();
        if state.config.heuristic_fallback {
            types.extend(self.heuristic.supported_types().iter().map(|t| t.to_string()));
        }
        types.sort();
        types.dedup();
        Ok(types)
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

pub(crate) fn check_batch(len: usize) -> Result<()> {
    if len > MAX_BATCH_SIZE {
        return Err(PipelineError::InvalidInput(format!(
            "batch of {len} exceeds the maximum of {MAX_BATCH_SIZE}"
        )));
    }
    Ok(())
}
