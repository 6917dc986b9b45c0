use exam_core::model::ExamSnapshot;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{SnapshotRepository, StorageError};

/// Payload layout version written alongside every snapshot.
///
/// Snapshots written by a different version are refused rather than migrated.
pub const SNAPSHOT_FORMAT_VERSION: i64 = 1;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl SnapshotRepository for SqliteRepository {
    async fn save_snapshot(&self, snapshot: &ExamSnapshot) -> Result<(), StorageError> {
        let payload = serde_json::to_string(snapshot).map_err(ser)?;

        sqlx::query(
            r"
            INSERT INTO exam_snapshots (id, format_version, payload, source_name, saved_at)
            VALUES (1, ?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                format_version = excluded.format_version,
                payload = excluded.payload,
                source_name = excluded.source_name,
                saved_at = excluded.saved_at
            ",
        )
        .bind(SNAPSHOT_FORMAT_VERSION)
        .bind(payload)
        .bind(snapshot.source_name.as_deref())
        .bind(snapshot.saved_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<ExamSnapshot>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT format_version, payload
            FROM exam_snapshots
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let found: i64 = row.try_get("format_version").map_err(ser)?;
        if found != SNAPSHOT_FORMAT_VERSION {
            return Err(StorageError::UnsupportedFormat {
                found,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let payload: String = row.try_get("payload").map_err(ser)?;
        serde_json::from_str(&payload).map(Some).map_err(ser)
    }

    async fn clear_snapshot(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM exam_snapshots WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
