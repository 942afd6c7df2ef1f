//! Owns every model record, the download registry and the loaded sessions.

use crate::config::ManagerConfig;
use crate::download::{self, ByteProgress};
use crate::tracker::DownloadTracker;
use crate::{
    ArtifactSource, Catalog, LoadedModel, MemoryPressure, ModelDescriptor, ModelError, ModelKind,
    ProgressThrottle, Result,
};
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use veil_events::{
    event_names, DownloadProgressEvent, EventBusRef, ModelResidencyEvent, ModelStateChangedEvent,
    ModelStateDto,
};
use veil_inference::InferenceEngine;

/// On-disk state of one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    NotDownloaded,
    Downloading,
    Ready,
    Error,
}

impl From<ModelState> for ModelStateDto {
    fn from(state: ModelState) -> Self {
        match state {
            ModelState::NotDownloaded => ModelStateDto::NotDownloaded,
            ModelState::Downloading => ModelStateDto::Downloading,
            ModelState::Ready => ModelStateDto::Ready,
            ModelState::Error => ModelStateDto::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelRecord {
    pub state: ModelState,
    /// Fraction in `[0, 1]`; meaningful while `Downloading`.
    pub progress: f64,
    /// Set only while `Ready`.
    pub local_path: Option<PathBuf>,
    pub size_bytes: Option<u64>,
    pub last_access: Instant,
    pub last_error: Option<String>,
}

impl ModelRecord {
    fn new() -> Self {
        Self {
            state: ModelState::NotDownloaded,
            progress: 0.0,
            local_path: None,
            size_bytes: None,
            last_access: Instant::now(),
            last_error: None,
        }
    }
}

/// Catalog entry joined with its current state, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
    pub kind: ModelKind,
    pub state: ModelState,
    pub progress: f64,
    pub local_path: Option<PathBuf>,
    pub size_bytes: Option<u64>,
    pub loaded: bool,
    pub last_error: Option<String>,
}

struct LoadedEntry {
    model: Arc<LoadedModel>,
    last_used: Instant,
}

struct Inner {
    config: ManagerConfig,
    catalog: Catalog,
    source: Arc<dyn ArtifactSource>,
    engine: Arc<dyn InferenceEngine>,
    events: EventBusRef,
    records: Mutex<HashMap<String, ModelRecord>>,
    downloads: DownloadTracker,
    /// Presence of loaded sessions; held across load/unload, never across inference.
    loaded: tokio::sync::Mutex<HashMap<String, LoadedEntry>>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Total size of the files in `dir`.
fn dir_size(dir: &Path) -> Option<u64> {
    let entries = std::fs::read_dir(dir).ok()?;
    Some(
        entries
            .filter_map(|e| e.ok()?.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum(),
    )
}

impl Inner {
    fn update_record<R>(&self, id: &str, f: impl FnOnce(&mut ModelRecord) -> R) -> R {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        f(records
            .entry(id.to_string())
            .or_insert_with(ModelRecord::new))
    }

    fn record(&self, id: &str) -> ModelRecord {
        self.update_record(id, |r| r.clone())
    }

    fn emit<T: Serialize>(&self, topic: &str, payload: &T) {
        if let Err(e) = veil_events::publish_json(self.events.as_ref(), topic, payload) {
            tracing::warn!(topic, error = %e, "Failed to serialize event");
        }
    }

    fn set_state(&self, id: &str, state: ModelState, error: Option<String>) {
        self.update_record(id, |r| {
            r.state = state;
            r.last_error = error.clone();
            if state != ModelState::Ready {
                r.local_path = None;
                r.size_bytes = None;
            }
            if state != ModelState::Downloading {
                r.progress = if state == ModelState::Ready { 1.0 } else { 0.0 };
            }
        });
        self.emit(
            event_names::STATE_CHANGED,
            &ModelStateChangedEvent {
                model_id: id.to_string(),
                state: state.into(),
                error,
                ts_ms: Some(now_ms()),
            },
        );
    }

    fn mark_ready(&self, id: &str, path: &Path) {
        let size = dir_size(path);
        self.set_state(id, ModelState::Ready, None);
        self.update_record(id, |r| {
            r.local_path = Some(path.to_path_buf());
            r.size_bytes = size;
        });
        self.emit(
            event_names::MODEL_READY,
            &serde_json::json!({ "model_id": id, "path": path }),
        );
    }

    fn emit_residency(&self, id: &str, loaded: bool, reason: Option<&str>) {
        self.emit(
            event_names::MODEL_RESIDENCY,
            &ModelResidencyEvent {
                model_id: id.to_string(),
                loaded,
                reason: reason.map(str::to_string),
            },
        );
    }

    /// `Ready` path that still exists on disk.
    fn ready_path(&self, id: &str) -> Option<PathBuf> {
        let record = self.record(id);
        let path = record.local_path.filter(|_| record.state == ModelState::Ready)?;
        if path.is_dir() {
            return Some(path);
        }
        tracing::warn!(model = id, path = ?path, "Cached model disappeared from disk");
        self.set_state(id, ModelState::NotDownloaded, None);
        None
    }

    fn bundled_path(&self, id: &str) -> Option<PathBuf> {
        let dir = self.config.bundled_dir.as_ref()?.join(id);
        dir.is_dir().then_some(dir)
    }

    async fn run_download(
        self: Arc<Self>,
        descriptor: ModelDescriptor,
        generation: u64,
        cancel: CancellationToken,
    ) -> Result<PathBuf> {
        let id = descriptor.id.clone();
        let final_dir = self.config.model_dir(&id);
        let staging = self.config.staging_dir().join(format!("{id}-{generation}"));

        if let Some(bundled) = self.bundled_path(&id) {
            match download::install_bundled(&descriptor, &bundled, &staging, &final_dir).await {
                Ok(path) => {
                    tracing::info!(model = %id, path = ?path, "Installed bundled model");
                    return self.complete(&id, generation, Ok(path));
                }
                Err(e) => {
                    tracing::warn!(model = %id, error = %e, "Bundled model rejected, downloading instead");
                }
            }
        }

        let mut throttle = ProgressThrottle::new();
        let result = download::download_model(
            &descriptor,
            self.source.as_ref(),
            &staging,
            &final_dir,
            &cancel,
            |p: ByteProgress<'_>| {
                if let Some(fraction) = throttle.update(p.downloaded, p.total) {
                    self.publish_progress(&id, generation, fraction, p);
                }
            },
        )
        .await;

        self.complete(&id, generation, result)
    }

    fn publish_progress(&self, id: &str, generation: u64, fraction: f64, p: ByteProgress<'_>) {
        self.downloads.with_current(id, generation, || {
            self.update_record(id, |r| r.progress = fraction);
            self.emit(
                event_names::DOWNLOAD_PROGRESS,
                &DownloadProgressEvent {
                    model_id: id.to_string(),
                    progress: fraction,
                    downloaded_bytes: p.downloaded,
                    total_bytes: p.total,
                    file: Some(p.file.to_string()),
                    ts_ms: Some(now_ms()),
                },
            );
        });
    }

    /// Publish the outcome of download `generation`, unless it was superseded.
    fn complete(&self, id: &str, generation: u64, result: Result<PathBuf>) -> Result<PathBuf> {
        let published = self.downloads.finish_with(id, generation, || match &result {
            Ok(path) => self.mark_ready(id, path),
            Err(ModelError::Cancelled(_)) => self.set_state(id, ModelState::NotDownloaded, None),
            // Nothing was kept, so the model is simply not downloaded.
            Err(e @ ModelError::Integrity { .. }) => {
                self.set_state(id, ModelState::NotDownloaded, Some(e.to_string()))
            }
            Err(e) => self.set_state(id, ModelState::Error, Some(e.to_string())),
        });

        match (&result, published.is_some()) {
            (Ok(path), true) => tracing::info!(model = id, path = ?path, "Model ready"),
            (Err(e), true) => tracing::warn!(model = id, error = %e, "Model download failed"),
            (_, false) => {
                tracing::debug!(model = id, generation, "Discarding outcome of superseded download")
            }
        }
        result
    }
}

/// Model lifecycle manager.
///
/// Cheap to clone; clones share the same state. Independent managers (for
/// example with different cache directories) can coexist.
#[derive(Clone)]
pub struct ModelManager {
    inner: Arc<Inner>,
}

impl ModelManager {
    pub fn new(
        config: ManagerConfig,
        catalog: Catalog,
        source: Arc<dyn ArtifactSource>,
        engine: Arc<dyn InferenceEngine>,
        events: EventBusRef,
    ) -> Self {
        let records = catalog
            .iter()
            .map(|d| (d.id.clone(), ModelRecord::new()))
            .collect();
        Self {
            inner: Arc::new(Inner {
                config,
                catalog,
                source,
                engine,
                events,
                records: Mutex::new(records),
                downloads: DownloadTracker::new(),
                loaded: tokio::sync::Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Discover previously cached models and clear stale staging files.
    ///
    /// Cached directories that fail re-verification are removed. A model with
    /// no valid cache entry is installed from the bundled directory when a
    /// copy ships there.
    pub async fn initialize(&self) -> Result<()> {
        let config = &self.inner.config;
        tokio::fs::create_dir_all(&config.cache_dir).await?;

        let staging = config.staging_dir();
        if tokio::fs::try_exists(&staging).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&staging).await?;
        }

        let mut ready = 0usize;
        for descriptor in self.inner.catalog.iter() {
            let dir = config.model_dir(&descriptor.id);
            if dir.is_dir() {
                match download::verify_cached(
                    descriptor,
                    &dir,
                    config.verify_checksums_on_startup,
                )
                .await
                {
                    Ok(()) => {
                        self.inner.mark_ready(&descriptor.id, &dir);
                        ready += 1;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(model = %descriptor.id, error = %e, "Discarding invalid cached model");
                        tokio::fs::remove_dir_all(&dir).await?;
                        self.inner
                            .set_state(&descriptor.id, ModelState::NotDownloaded, None);
                    }
                }
            }

            let Some(bundled) = self.inner.bundled_path(&descriptor.id) else {
                continue;
            };
            let bundle_staging = staging.join(format!("{}-bundled", descriptor.id));
            match download::install_bundled(descriptor, &bundled, &bundle_staging, &dir).await {
                Ok(path) => {
                    tracing::info!(model = %descriptor.id, path = ?path, "Installed bundled model");
                    self.inner.mark_ready(&descriptor.id, &path);
                    ready += 1;
                }
                Err(e) => {
                    tracing::warn!(model = %descriptor.id, error = %e, "Bundled model rejected");
                }
            }
        }

        tracing::info!(
            cache_dir = ?config.cache_dir,
            models = self.inner.catalog.len(),
            ready,
            "Model manager initialized"
        );
        Ok(())
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn descriptor(&self, id: &str) -> Result<&ModelDescriptor> {
        self.inner.catalog.require(id)
    }

    pub fn status(&self, id: &str) -> Result<ModelRecord> {
        self.inner.catalog.require(id)?;
        Ok(self.inner.record(id))
    }

    pub fn is_ready(&self, id: &str) -> bool {
        self.inner.ready_path(id).is_some()
    }

    /// Every catalog entry with its current state.
    pub async fn list(&self) -> Vec<ModelInfo> {
        let loaded = self.inner.loaded.lock().await;
        self.inner
            .catalog
            .iter()
            .map(|d| {
                let record = self.inner.record(&d.id);
                ModelInfo {
                    id: d.id.clone(),
                    display_name: d.display_name.clone(),
                    kind: d.kind,
                    state: record.state,
                    progress: record.progress,
                    local_path: record.local_path,
                    size_bytes: record.size_bytes,
                    loaded: loaded.contains_key(&d.id),
                    last_error: record.last_error,
                }
            })
            .collect()
    }

    /// Make `id` available on disk and return its cache directory.
    ///
    /// Returns at once if the model is `Ready`. Concurrent calls for the same
    /// id share a single transfer and observe the same outcome.
    pub async fn download(&self, id: &str) -> Result<PathBuf> {
        let descriptor = self.inner.catalog.require(id)?.clone();
        if let Some(path) = self.inner.ready_path(id) {
            return Ok(path);
        }

        // A transfer that finished since the check above has already
        // promoted its directory; the tracker rechecks under its lock.
        let joined = self.inner.downloads.join_or_start(
            id,
            || self.inner.ready_path(id),
            |generation, token| {
                self.inner.set_state(id, ModelState::Downloading, None);
                let inner = Arc::clone(&self.inner);
                let model = id.to_string();
                let handle = tokio::spawn(inner.run_download(descriptor, generation, token));
                async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(ModelError::DownloadFailed {
                            model,
                            reason: e.to_string(),
                        })
                    })
                }
                .boxed()
            },
        );
        let joined = match joined {
            Ok(joined) => joined,
            Err(path) => return Ok(path),
        };

        if joined.started {
            tracing::info!(model = id, "Download started");
        } else {
            tracing::debug!(model = id, "Attaching to in-flight download");
        }
        joined.task.await
    }

    /// Abort the transfer of `id`. The model returns to `NotDownloaded` right
    /// away; a following `download` starts a fresh transfer.
    pub fn cancel_download(&self, id: &str) -> bool {
        let cancelled = self.inner.downloads.cancel_with(id, || {
            self.inner.set_state(id, ModelState::NotDownloaded, None);
        });
        if cancelled {
            tracing::info!(model = id, "Download cancelled");
        }
        cancelled
    }

    pub fn is_downloading(&self, id: &str) -> bool {
        self.inner.downloads.has(id)
    }

    /// Unload `id` and remove its cached files.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.inner.catalog.require(id)?;
        self.cancel_download(id);
        self.unload_with_reason(id, "deleted").await;

        let dir = self.inner.config.model_dir(id);
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        self.inner.set_state(id, ModelState::NotDownloaded, None);
        tracing::info!(model = id, "Model deleted");
        Ok(())
    }

    /// Loaded model for `id`, loading it from the cache if needed.
    ///
    /// A bundled copy is installed first when nothing is cached. Fails with
    /// [`ModelError::NotDownloaded`] when no artifact is available locally;
    /// this never starts a network download.
    pub async fn acquire(&self, id: &str) -> Result<Arc<LoadedModel>> {
        let descriptor = self.inner.catalog.require(id)?.clone();

        if self.inner.ready_path(id).is_none() && self.inner.bundled_path(id).is_some() {
            self.download(id).await?;
        }

        let mut loaded = self.inner.loaded.lock().await;
        if let Some(entry) = loaded.get_mut(id) {
            entry.last_used = Instant::now();
            return Ok(Arc::clone(&entry.model));
        }

        let dir = self
            .inner
            .ready_path(id)
            .ok_or_else(|| ModelError::NotDownloaded(id.to_string()))?;
        let engine = Arc::clone(&self.inner.engine);
        let model = tokio::task::spawn_blocking(move || {
            LoadedModel::load(&descriptor, &dir, engine.as_ref())
        })
        .await
        .map_err(|e| ModelError::LoadFailed {
            model: id.to_string(),
            reason: e.to_string(),
        })??;

        let model = Arc::new(model);
        loaded.insert(
            id.to_string(),
            LoadedEntry {
                model: Arc::clone(&model),
                last_used: Instant::now(),
            },
        );
        drop(loaded);

        self.inner.update_record(id, |r| r.last_access = Instant::now());
        self.inner.emit_residency(id, true, None);
        Ok(model)
    }

    /// Record a successful inference on `id`, resetting its idle time.
    pub async fn mark_used(&self, id: &str) {
        let mut loaded = self.inner.loaded.lock().await;
        if let Some(entry) = loaded.get_mut(id) {
            entry.last_used = Instant::now();
        }
        drop(loaded);
        self.inner.update_record(id, |r| r.last_access = Instant::now());
    }

    pub async fn is_loaded(&self, id: &str) -> bool {
        self.inner.loaded.lock().await.contains_key(id)
    }

    pub async fn loaded_models(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.loaded.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Release the in-memory session of `id`. Disk state is unchanged.
    pub async fn unload(&self, id: &str) -> bool {
        self.unload_with_reason(id, "explicit").await
    }

    async fn unload_with_reason(&self, id: &str, reason: &str) -> bool {
        let removed = self.inner.loaded.lock().await.remove(id).is_some();
        if removed {
            tracing::info!(model = id, reason, "Model unloaded");
            self.inner.emit_residency(id, false, Some(reason));
        }
        removed
    }

    /// Unload models according to `level`. Returns the unloaded ids.
    pub async fn on_memory_pressure(&self, level: MemoryPressure) -> Vec<String> {
        let threshold = self.inner.config.idle_unload_after();
        let now = Instant::now();

        let mut loaded = self.inner.loaded.lock().await;
        let mut victims: Vec<String> = loaded
            .iter()
            .filter(|(_, e)| level.should_unload(now.duration_since(e.last_used), threshold))
            .map(|(id, _)| id.clone())
            .collect();
        victims.sort();
        for id in &victims {
            loaded.remove(id);
        }
        let remaining = loaded.len();
        drop(loaded);

        for id in &victims {
            self.inner.emit_residency(id, false, Some("memory_pressure"));
        }
        tracing::info!(
            ?level,
            unloaded = victims.len(),
            remaining,
            "Handled memory pressure"
        );
        victims
    }

    /// Apply every signal received on `signals` until the sender is dropped.
    pub fn watch_memory_pressure(&self, mut signals: mpsc::Receiver<MemoryPressure>) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(level) = signals.recv().await {
                manager.on_memory_pressure(level).await;
            }
            tracing::debug!("Memory pressure channel closed");
        })
    }
}
