//! Checkpoint repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::checkpoint::Checkpoint;
use crate::{AppError, Result};

use super::db::Database;
use super::{CheckpointStore, StoreFuture};

/// Repository wrapper around `SQLite` for checkpoint records.
///
/// The full checkpoint is stored as one JSON document per session; `stage`
/// and `version` are duplicated into columns for operator queries.
#[derive(Clone)]
pub struct CheckpointRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct CheckpointRow {
    state: String,
}

impl CheckpointRow {
    fn into_checkpoint(self) -> Result<Checkpoint> {
        serde_json::from_str(&self.state)
            .map_err(|err| AppError::Db(format!("corrupt checkpoint state: {err}")))
    }
}

impl CheckpointRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Retrieve a checkpoint by session identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or the stored state is corrupt.
    pub async fn get_by_session(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let row: Option<CheckpointRow> =
            sqlx::query_as("SELECT state FROM checkpoint WHERE session_id = ?1")
                .bind(session_id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(CheckpointRow::into_checkpoint).transpose()
    }

    /// Insert or replace the checkpoint for its session in one statement.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if serialization or the upsert fails.
    pub async fn upsert(&self, checkpoint: &Checkpoint) -> Result<()> {
        let state = serde_json::to_string(checkpoint)?;
        let version = i64::try_from(checkpoint.version)
            .map_err(|err| AppError::Db(format!("checkpoint version out of range: {err}")))?;

        sqlx::query(
            "INSERT INTO checkpoint (session_id, stage, version, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(session_id) DO UPDATE SET
                stage = excluded.stage,
                version = excluded.version,
                state = excluded.state,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
        )
        .bind(&checkpoint.session_id)
        .bind(checkpoint.stage.as_str())
        .bind(version)
        .bind(&state)
        .bind(checkpoint.created_at.to_rfc3339())
        .bind(checkpoint.updated_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Delete the checkpoint for a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete_for_session(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM checkpoint WHERE session_id = ?1")
            .bind(session_id)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Delete every checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM checkpoint")
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Count stored checkpoints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_all(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checkpoint")
            .fetch_one(self.db.as_ref())
            .await?;
        usize::try_from(count).map_err(|err| AppError::Db(format!("invalid count: {err}")))
    }
}

impl CheckpointStore for CheckpointRepo {
    fn get(&self, session_id: &str) -> StoreFuture<'_, Option<Checkpoint>> {
        let key = session_id.to_owned();
        Box::pin(async move { self.get_by_session(&key).await })
    }

    fn put(&self, checkpoint: Checkpoint) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.upsert(&checkpoint).await })
    }

    fn delete(&self, session_id: &str) -> StoreFuture<'_, ()> {
        let key = session_id.to_owned();
        Box::pin(async move { self.delete_for_session(&key).await })
    }

    fn clear_all(&self) -> StoreFuture<'_, ()> {
        Box::pin(self.delete_all())
    }

    fn count(&self) -> StoreFuture<'_, usize> {
        Box::pin(self.count_all())
    }
}
