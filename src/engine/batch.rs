//! engine::batch
//!
//! Serialized publication of several independent roots.
//!
//! Roots are processed strictly one after another, each with a fresh
//! visited set. Concurrent callers sharing a coordinator queue on its lock,
//! so two name resolutions never race against the same backend.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{Engine, PublishError, PublishOutcome, UnpublishError, UnpublishOutcome};

/// Result for one root of a batch.
#[derive(Debug)]
pub struct BatchEntry<T, E> {
    pub path: PathBuf,
    pub result: Result<T, E>,
}

/// Per-root results, in request order.
#[derive(Debug)]
pub struct BatchReport<T, E> {
    pub entries: Vec<BatchEntry<T, E>>,
}

impl<T, E> BatchReport<T, E> {
    /// Number of roots that succeeded.
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_ok()).count()
    }

    /// Entries that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &E)> {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().err().map(|err| (e.path.as_path(), err)))
    }

    /// Whether every root succeeded.
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|e| e.result.is_ok())
    }
}

/// Runs publish and unpublish requests one root at a time.
#[derive(Debug)]
pub struct BatchCoordinator<'a> {
    engine: Mutex<Engine<'a>>,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(engine: Engine<'a>) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    /// Publish every root in order. A failing root never stops later ones.
    pub async fn publish_all(
        &self,
        paths: &[PathBuf],
    ) -> BatchReport<PublishOutcome, PublishError> {
        let engine = self.engine.lock().await;
        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let result = engine.publish(path).await;
            if let Err(e) = &result {
                warn!(path = %path.display(), error = %e, "root not published");
            }
            entries.push(BatchEntry {
                path: path.clone(),
                result,
            });
        }
        info!(roots = entries.len(), "batch publish finished");
        BatchReport { entries }
    }

    /// Unpublish every root in order. A failing root never stops later ones.
    pub async fn unpublish_all(
        &self,
        paths: &[PathBuf],
    ) -> BatchReport<UnpublishOutcome, UnpublishError> {
        let engine = self.engine.lock().await;
        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let result = engine.unpublish(path).await;
            if let Err(e) = &result {
                warn!(path = %path.display(), error = %e, "root not unpublished");
            }
            entries.push(BatchEntry {
                path: path.clone(),
                result,
            });
        }
        info!(roots = entries.len(), "batch unpublish finished");
        BatchReport { entries }
    }
}
