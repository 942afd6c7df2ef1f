use crate::cache::ResultCache;
use crate::config::SentimentConfig;
use crate::error::{PipelineError, Result};
use crate::pii::check_batch;
use crate::stats::{Outcome, ServiceStats, StatsRecorder};
use std::time::Instant;
use tokio::sync::RwLock;
use veil_decode::{decode_sequence_classification, ClassificationResult, ClassificationSource};
use veil_inference::run_sequence_classification;
use veil_models::ModelManager;
use veil_patterns::LexiconScorer;

/// Short-text sentiment classification.
///
/// Uses the sequence-classification model when it is available and the
/// lexicon scorer otherwise, unless the model is required.
pub struct SentimentAnalyzer {
    models: ModelManager,
    lexicon: LexiconScorer,
    config: RwLock<Option<SentimentConfig>>,
    cache: ResultCache<ClassificationResult>,
    stats: StatsRecorder,
}

impl SentimentAnalyzer {
    pub fn new(models: ModelManager) -> Self {
        Self {
            models,
            lexicon: LexiconScorer::new(),
            config: RwLock::new(None),
            cache: ResultCache::new(0),
            stats: StatsRecorder::new(),
        }
    }

    /// Apply `config` and clear cached results.
    pub async fn initialize(&self, config: SentimentConfig) -> Result<()> {
        config.validate()?;
        self.models.descriptor(&config.model_id)?;

        if config.require_model {
            self.models
                .acquire(&config.model_id)
                .await
                .map_err(|e| PipelineError::from_model(e, &config.labels))?;
        }

        self.cache.clear();
        self.cache.set_capacity(if config.enable_caching {
            config.max_cache_size
        } else {
            0
        });

        tracing::info!(
            model = %config.model_id,
            caching = config.enable_caching,
            require_model = config.require_model,
            "Sentiment analysis initialized"
        );
        *self.config.write().await = Some(config);
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.config.read().await.is_some()
    }

    /// Drop the configuration, cached results and the model.
    pub async fn shutdown(&self) {
        if let Some(config) = self.config.write().await.take() {
            self.cache.clear();
            self.models.unload(&config.model_id).await;
            tracing::info!(model = %config.model_id, "Sentiment analysis shut down");
        }
    }

    pub async fn analyze(&self, text: &str) -> Result<ClassificationResult> {
        let started = Instant::now();
        let guard = self.config.read().await;
        let config = guard.as_ref().ok_or(PipelineError::NotInitialized)?;

        if config.enable_caching {
            if let Some(hit) = self.cache.get(text) {
                self.stats.record(Outcome::CacheHit, started.elapsed());
                return Ok(hit);
            }
        }

        let (mut result, outcome) = match self.run_model(config, text).await {
            Ok(result) => (result, Outcome::Model),
            Err(e) if config.require_model => {
                self.stats.record(Outcome::Error, started.elapsed());
                return Err(e);
            }
            Err(e) => {
                match &e {
                    PipelineError::ModelNotReady { model, .. } => {
                        tracing::debug!(model = %model, "Model not ready, using lexicon");
                    }
                    other => {
                        tracing::warn!(model = %config.model_id, error = %other, "Sentiment model failed, using lexicon");
                    }
                }
                (
                    self.lexicon.score_with_labels(text, config.label_triplet()),
                    Outcome::Fallback,
                )
            }
        };

        if result.confidence < config.min_confidence {
            tracing::debug!(
                label = %result.label,
                confidence = result.confidence,
                "Below minimum confidence, using default label"
            );
            result.label = config.default_label.clone();
        }

        // Lexicon answers would outlive a model that becomes ready later.
        if config.enable_caching && result.source == ClassificationSource::Model {
            self.cache.insert(text, result.clone());
        }
        self.stats.record(outcome, started.elapsed());
        Ok(result)
    }

    async fn run_model(&self, config: &SentimentConfig, text: &str) -> Result<ClassificationResult> {
        let model = self
            .models
            .acquire(&config.model_id)
            .await
            .map_err(|e| PipelineError::from_model(e, &config.labels))?;

        let text = text.to_string();
        let taxonomy = config.labels.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<ClassificationResult> {
            let tokenized =
                model
                    .tokenizer()
                    .tokenize(&text, model.max_sequence_length(), true)?;
            let logits =
                run_sequence_classification(model.session(), &tokenized, model.labels().len())?;
            decode_sequence_classification(&logits, model.labels(), &taxonomy).ok_or_else(|| {
                PipelineError::InferenceFailure(format!(
                    "{} logits do not match {} model labels",
                    logits.len(),
                    model.labels().len()
                ))
            })
        })
        .await??;

        self.models.mark_used(&config.model_id).await;
        Ok(result)
    }

    /// Classify every text concurrently, one result per item.
    pub async fn analyze_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
    ) -> Result<Vec<Result<ClassificationResult>>> {
        check_batch(texts.len())?;
        if !self.is_initialized().await {
            return Err(PipelineError::NotInitialized);
        }
        Ok(futures::future::join_all(texts.iter().map(|t| self.analyze(t.as_ref()))).await)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}
