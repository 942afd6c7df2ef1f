//! Fetch, verify and promote model artifacts into the cache.
//!
//! Files are streamed into `<cache>/.staging/<id>-<generation>/`. Nothing is
//! moved into `<cache>/<id>/` until every file of the model passed its size
//! and checksum checks; on any failure the staging directory is removed.

use crate::{ArtifactMetadata, ArtifactSource, ModelDescriptor, ModelError, Result};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Files smaller than this are treated as truncated or error pages.
pub const MIN_ARTIFACT_BYTES: u64 = 1024;

/// Written next to the artifacts once they are verified.
pub(crate) const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ManifestEntry {
    pub name: String,
    pub size_bytes: u64,
    pub checksum: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Manifest {
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// Byte-level progress for the whole model (all files).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ByteProgress<'a> {
    pub downloaded: u64,
    pub total: u64,
    pub file: &'a str,
}

/// SHA-256 of a file, lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn integrity(model: &str, reason: String) -> ModelError {
    ModelError::Integrity {
        model: model.to_string(),
        reason,
    }
}

/// Checksum the artifact must match: the descriptor's pin wins over metadata.
fn expected_checksum<'a>(
    descriptor: &'a ModelDescriptor,
    file_name: &str,
    declared: Option<&'a str>,
) -> Option<&'a str> {
    if file_name == descriptor.file_name {
        descriptor.checksum.as_deref().or(declared)
    } else {
        declared
    }
}

/// Check one transferred file against what was declared for it.
pub(crate) fn verify_artifact(
    descriptor: &ModelDescriptor,
    file_name: &str,
    declared_size: u64,
    declared_checksum: Option<&str>,
    actual_size: u64,
    actual_checksum: &str,
) -> Result<()> {
    let model = descriptor.id.as_str();

    if actual_size < MIN_ARTIFACT_BYTES {
        return Err(integrity(
            model,
            format!("{file_name} is {actual_size} bytes, below the {MIN_ARTIFACT_BYTES} byte minimum"),
        ));
    }
    if actual_size != declared_size {
        return Err(integrity(
            model,
            format!("{file_name} is {actual_size} bytes, expected {declared_size}"),
        ));
    }
    if file_name == descriptor.file_name {
        if let Some(expected) = descriptor.size_bytes {
            if expected != actual_size {
                return Err(integrity(
                    model,
                    format!("{file_name} is {actual_size} bytes, catalog expects {expected}"),
                ));
            }
        }
    }
    if let Some(expected) = expected_checksum(descriptor, file_name, declared_checksum) {
        if !expected.eq_ignore_ascii_case(actual_checksum) {
            return Err(integrity(
                model,
                format!("{file_name} checksum mismatch: expected {expected}, got {actual_checksum}"),
            ));
        }
    }
    Ok(())
}

/// Stream one artifact into `dest`, hashing as it goes.
async fn fetch_file<F>(
    source: &dyn ArtifactSource,
    meta: &ArtifactMetadata,
    dest: &Path,
    cancel: &CancellationToken,
    mut on_chunk: F,
) -> Result<(u64, String)>
where
    F: FnMut(u64),
{
    if cancel.is_cancelled() {
        return Err(ModelError::Cancelled(meta.url.clone()));
    }

    let mut stream = source.open_artifact(&meta.url).await?;
    let mut file = tokio::fs::File::create(dest).await?;
    let mut hasher = Sha256::new();
    let mut written = 0u64;

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Err(ModelError::Cancelled(meta.url.clone())),
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk?;

        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        written += chunk.len() as u64;
        on_chunk(chunk.len() as u64);
    }

    file.flush().await?;
    Ok((written, format!("{:x}", hasher.finalize())))
}

/// Download every file of `descriptor` and promote the verified set to `final_dir`.
pub(crate) async fn download_model<F>(
    descriptor: &ModelDescriptor,
    source: &dyn ArtifactSource,
    staging: &Path,
    final_dir: &Path,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<PathBuf>
where
    F: FnMut(ByteProgress<'_>),
{
    if tokio::fs::try_exists(staging).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(staging).await?;
    }
    tokio::fs::create_dir_all(staging).await?;

    let result = async {
        let mut plan = Vec::with_capacity(2);
        for file_name in descriptor.files() {
            let meta = source.fetch_metadata(&descriptor.id, file_name).await?;
            tracing::debug!(
                model = %descriptor.id,
                file = file_name,
                size = meta.size_bytes,
                format = %meta.format,
                "Artifact metadata"
            );
            plan.push((file_name, meta));
        }

        let total: u64 = plan.iter().map(|(_, m)| m.size_bytes).sum();
        let mut downloaded = 0u64;
        let mut manifest = Manifest::default();

        for (file_name, meta) in &plan {
            let dest = staging.join(file_name);
            let (size, checksum) = fetch_file(source, meta, &dest, cancel, |n| {
                downloaded += n;
                on_progress(ByteProgress {
                    downloaded,
                    total,
                    file: file_name,
                });
            })
            .await?;

            verify_artifact(
                descriptor,
                file_name,
                meta.size_bytes,
                meta.checksum.as_deref(),
                size,
                &checksum,
            )?;
            manifest.files.push(ManifestEntry {
                name: file_name.to_string(),
                size_bytes: size,
                checksum,
            });
        }

        write_manifest(staging, &manifest).await?;
        if cancel.is_cancelled() {
            return Err(ModelError::Cancelled(descriptor.id.clone()));
        }
        promote(staging, final_dir).await
    }
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_dir_all(staging).await {
            tracing::debug!(path = ?staging, error = %e, "Staging cleanup failed");
        }
    }
    result
}

async fn write_manifest(dir: &Path, manifest: &Manifest) -> Result<()> {
    let json = serde_json::to_vec_pretty(manifest).map_err(|e| ModelError::Io(e.to_string()))?;
    tokio::fs::write(dir.join(MANIFEST_FILE), json).await?;
    Ok(())
}

async fn read_manifest(dir: &Path) -> Option<Manifest> {
    let bytes = tokio::fs::read(dir.join(MANIFEST_FILE)).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Replace `final_dir` with the verified `staging` directory.
///
/// An existing `final_dir` is renamed aside before the swap and removed after
/// it, so the cache entry is never absent while the new one lands.
async fn promote(staging: &Path, final_dir: &Path) -> Result<PathBuf> {
    if let Some(parent) = final_dir.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut retired = staging.as_os_str().to_owned();
    retired.push(".old");
    let retired = PathBuf::from(retired);

    let replaced = match tokio::fs::rename(final_dir, &retired).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = tokio::fs::rename(staging, final_dir).await {
        if replaced {
            let _ = tokio::fs::rename(&retired, final_dir).await;
        }
        return Err(e.into());
    }

    if replaced {
        if let Err(e) = tokio::fs::remove_dir_all(&retired).await {
            tracing::debug!(path = ?retired, error = %e, "Failed to remove replaced model dir");
        }
    }
    Ok(final_dir.to_path_buf())
}

/// Re-verify a cache directory against its manifest and the descriptor.
///
/// Sizes are always checked; checksums only when `rehash` is set.
pub(crate) async fn verify_cached(
    descriptor: &ModelDescriptor,
    dir: &Path,
    rehash: bool,
) -> Result<()> {
    let manifest = read_manifest(dir).await;

    for file_name in descriptor.files() {
        let path = dir.join(file_name);
        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|_| integrity(&descriptor.id, format!("{file_name} is missing")))?
            .len();

        let entry = manifest.as_ref().and_then(|m| m.get(file_name));
        let declared_size = entry.map(|e| e.size_bytes).unwrap_or(size);
        let declared_checksum = entry.map(|e| e.checksum.as_str());

        let needs_hash =
            rehash && expected_checksum(descriptor, file_name, declared_checksum).is_some();
        let actual_checksum = if needs_hash {
            let path = path.clone();
            tokio::task::spawn_blocking(move || sha256_file(&path))
                .await
                .map_err(|e| ModelError::Io(e.to_string()))??
        } else {
            expected_checksum(descriptor, file_name, declared_checksum)
                .unwrap_or_default()
                .to_string()
        };

        verify_artifact(
            descriptor,
            file_name,
            declared_size,
            declared_checksum,
            size,
            &actual_checksum,
        )?;
    }
    Ok(())
}

/// Copy a model shipped at `bundled/<id>/` into the cache after verifying it.
pub(crate) async fn install_bundled(
    descriptor: &ModelDescriptor,
    bundled: &Path,
    staging: &Path,
    final_dir: &Path,
) -> Result<PathBuf> {
    if tokio::fs::try_exists(staging).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(staging).await?;
    }
    tokio::fs::create_dir_all(staging).await?;

    let result = async {
        let mut manifest = Manifest::default();
        for file_name in descriptor.files() {
            let dest = staging.join(file_name);
            tokio::fs::copy(bundled.join(file_name), &dest).await?;
            let size = tokio::fs::metadata(&dest).await?.len();
            let hash_path = dest.clone();
            let checksum = tokio::task::spawn_blocking(move || sha256_file(&hash_path))
                .await
                .map_err(|e| ModelError::Io(e.to_string()))??;

            verify_artifact(descriptor, file_name, size, None, size, &checksum)?;
            manifest.files.push(ManifestEntry {
                name: file_name.to_string(),
                size_bytes: size,
                checksum,
            });
        }
        write_manifest(staging, &manifest).await?;
        promote(staging, final_dir).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_dir_all(staging).await;
    }
    result
}
