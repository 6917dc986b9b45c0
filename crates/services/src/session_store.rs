use std::sync::Arc;

use chrono::Duration;
use exam_core::exam::ExamState;
use exam_core::model::ExamSnapshot;
use exam_core::time::snapshot_freshness;
use storage::repository::{SnapshotRepository, StorageError};
use tracing::{debug, info, warn};

use crate::Clock;

/// Best-effort persistence of the running exam.
///
/// Nothing here can fail the exam flow: `load` degrades to "no snapshot", and
/// `save_best_effort` logs and reports instead of returning an error.
#[derive(Clone)]
pub struct SessionStore {
    clock: Clock,
    repo: Arc<dyn SnapshotRepository>,
    freshness: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn SnapshotRepository>) -> Self {
        Self {
            clock,
            repo,
            freshness: snapshot_freshness(),
        }
    }

    #[must_use]
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Snapshot `exam` stamped with the current time and store it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the repository rejects the write.
    pub async fn save(&self, exam: &ExamState, source_name: Option<&str>) -> Result<(), StorageError> {
        let snapshot = exam.snapshot(source_name.map(str::to_owned), self.clock.now());
        self.repo.save_snapshot(&snapshot).await
    }

    /// Like [`Self::save`], but logs failures. Returns whether the snapshot was stored.
    pub async fn save_best_effort(&self, exam: &ExamState, source_name: Option<&str>) -> bool {
        match self.save(exam, source_name).await {
            Ok(()) => {
                debug!(index = exam.current_index(), "saved exam snapshot");
                true
            }
            Err(err) => {
                warn!(error = %err, "could not save exam progress; continuing in memory");
                false
            }
        }
    }

    /// Most recent snapshot, if one exists and is still fresh.
    pub async fn load(&self) -> Option<ExamSnapshot> {
        let snapshot = match self.repo.load_snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "could not read saved exam; starting fresh");
                return None;
            }
        };

        let now = self.clock.now();
        if !snapshot.is_fresh(now, self.freshness) {
            info!(saved_at = %snapshot.saved_at, "saved exam is stale; ignoring it");
            return None;
        }
        Some(snapshot)
    }

    /// Rebuild the saved exam. Returns the exam and its source name.
    pub async fn restore(&self) -> Option<(ExamState, Option<String>)> {
        let snapshot = self.load().await?;
        let source_name = snapshot.source_name.clone();
        match ExamState::from_snapshot(snapshot) {
            Ok(exam) => {
                info!(
                    index = exam.current_index(),
                    total = exam.len(),
                    "restored saved exam"
                );
                Some((exam, source_name))
            }
            Err(err) => {
                warn!(error = %err, "saved exam is inconsistent; ignoring it");
                None
            }
        }
    }

    /// Forget the saved exam. Failures are logged.
    pub async fn clear(&self) {
        if let Err(err) = self.repo.clear_snapshot().await {
            warn!(error = %err, "could not clear saved exam");
        }
    }
}
