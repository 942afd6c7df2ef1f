//! In-flight download registry.
//!
//! One entry per model id holds a shared handle to the running transfer and
//! its cancellation token. A second `download` of the same id attaches to the
//! existing handle instead of starting another transfer.

use crate::Result;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub(crate) type SharedDownload = Shared<BoxFuture<'static, Result<PathBuf>>>;

struct InFlight {
    generation: u64,
    token: CancellationToken,
    task: SharedDownload,
}

/// Tracks active downloads with cancellation support.
#[derive(Default)]
pub(crate) struct DownloadTracker {
    active: Mutex<HashMap<String, InFlight>>,
    next_generation: AtomicU64,
}

/// Handle returned by [`DownloadTracker::join_or_start`].
pub(crate) struct Joined {
    pub task: SharedDownload,
    /// True when this call created the transfer.
    pub started: bool,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, InFlight>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check if a download is in progress.
    pub fn has(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Attach to the running download of `name`, or start one with `start`.
    ///
    /// With nothing in flight, `settled` is consulted first; a path it returns
    /// comes back as `Err` and no transfer is started. Both closures run under
    /// the registry lock, so `start` must only construct the future.
    pub fn join_or_start<S, F>(
        &self,
        name: &str,
        settled: S,
        start: F,
    ) -> std::result::Result<Joined, PathBuf>
    where
        S: FnOnce() -> Option<PathBuf>,
        F: FnOnce(u64, CancellationToken) -> BoxFuture<'static, Result<PathBuf>>,
    {
        use futures::FutureExt;

        let mut active = self.lock();
        if let Some(existing) = active.get(name) {
            return Ok(Joined {
                task: existing.task.clone(),
                started: false,
            });
        }
        if let Some(path) = settled() {
            return Err(path);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let task = start(generation, token.clone()).shared();
        active.insert(
            name.to_string(),
            InFlight {
                generation,
                token,
                task: task.clone(),
            },
        );
        Ok(Joined {
            task,
            started: true,
        })
    }

    /// Cancel a download if it exists and forget it immediately.
    ///
    /// `f` runs under the registry lock after the entry is removed.
    /// Returns true if the download was found and cancelled.
    pub fn cancel_with(&self, name: &str, f: impl FnOnce()) -> bool {
        let mut active = self.lock();
        match active.remove(name) {
            Some(entry) => {
                entry.token.cancel();
                f();
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `name` and run `f`, if it still belongs to `generation`.
    ///
    /// Returns `None` when the download was cancelled or superseded, in which
    /// case the caller must not publish its outcome.
    pub fn finish_with<R>(&self, name: &str, generation: u64, f: impl FnOnce() -> R) -> Option<R> {
        let mut active = self.lock();
        match active.get(name) {
            Some(entry) if entry.generation == generation => {
                active.remove(name);
                Some(f())
            }
            _ => None,
        }
    }

    /// Run `f` under the registry lock if `generation` is current.
    pub fn with_current<R>(&self, name: &str, generation: u64, f: impl FnOnce() -> R) -> Option<R> {
        let active = self.lock();
        match active.get(name) {
            Some(entry) if entry.generation == generation => Some(f()),
            _ => None,
        }
    }
}
