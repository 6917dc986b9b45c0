use async_trait::async_trait;
use exam_core::model::ExamSnapshot;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unsupported snapshot format version {found} (expected {expected})")]
    UnsupportedFormat { found: i64, expected: i64 },
}

/// Repository contract for the single saved exam.
///
/// There is at most one snapshot; saving overwrites the previous one.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Persist the snapshot, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be encoded or stored.
    async fn save_snapshot(&self, snapshot: &ExamSnapshot) -> Result<(), StorageError>;

    /// Fetch the stored snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend fails or the stored payload cannot be decoded.
    async fn load_snapshot(&self) -> Result<Option<ExamSnapshot>, StorageError>;

    /// Remove the stored snapshot. Succeeds when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend fails.
    async fn clear_snapshot(&self) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    snapshot: Arc<Mutex<Option<ExamSnapshot>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryRepository {
    async fn save_snapshot(&self, snapshot: &ExamSnapshot) -> Result<(), StorageError> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<ExamSnapshot>, StorageError> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn clear_snapshot(&self) -> Result<(), StorageError> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub snapshots: Arc<dyn SnapshotRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let snapshots: Arc<dyn SnapshotRepository> = Arc::new(InMemoryRepository::new());
        Self { snapshots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::exam::ExamState;
    use exam_core::model::{OptionLabel, QuestionDraft};
    use exam_core::time::fixed_now;

    fn build_snapshot() -> ExamSnapshot {
        let question = QuestionDraft::new("Q", [("A", "x"), ("B", "y")], "A")
            .validate()
            .unwrap();
        let mut exam = ExamState::new(vec![question]).unwrap();
        exam.submit_answer(OptionLabel::new("A").unwrap()).unwrap();
        exam.snapshot(Some("bank.json".into()), fixed_now())
    }

    #[tokio::test]
    async fn round_trips_and_overwrites_snapshot() {
        let repo = InMemoryRepository::new();
        assert!(repo.load_snapshot().await.unwrap().is_none());

        let first = build_snapshot();
        repo.save_snapshot(&first).await.unwrap();
        assert_eq!(repo.load_snapshot().await.unwrap(), Some(first.clone()));

        let mut second = first;
        second.source_name = None;
        repo.save_snapshot(&second).await.unwrap();
        assert_eq!(repo.load_snapshot().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn clear_removes_snapshot() {
        let storage = Storage::in_memory();
        storage.snapshots.save_snapshot(&build_snapshot()).await.unwrap();
        storage.snapshots.clear_snapshot().await.unwrap();
        assert!(storage.snapshots.load_snapshot().await.unwrap().is_none());
        storage.snapshots.clear_snapshot().await.unwrap();
    }
}
