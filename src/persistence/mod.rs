//! Persistence layer: the checkpoint store abstraction and its backends.
//!
//! The orchestrator only talks to [`CheckpointStore`]. The in-memory
//! [`MemoryCheckpointStore`] covers the process-lifetime contract; the
//! `SQLite`-backed [`CheckpointRepo`] survives restarts.

pub mod checkpoint_repo;
pub mod db;
pub mod memory;
pub mod schema;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use crate::models::checkpoint::Checkpoint;
use crate::{GlobalConfig, Result};

pub use checkpoint_repo::CheckpointRepo;
pub use memory::MemoryCheckpointStore;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Boxed future returned by [`CheckpointStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Key-value store from session id to suspended workflow state.
///
/// Every write replaces the whole checkpoint, so a reader never observes a
/// partially updated session. Callers serialize writers per session.
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint for `session_id`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the backend cannot be read.
    fn get(&self, session_id: &str) -> StoreFuture<'_, Option<Checkpoint>>;

    /// Insert or replace the checkpoint keyed by its `session_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    fn put(&self, checkpoint: Checkpoint) -> StoreFuture<'_, ()>;

    /// Remove one session's checkpoint. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    fn delete(&self, session_id: &str) -> StoreFuture<'_, ()>;

    /// Remove every checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the store is unreachable.
    fn clear_all(&self) -> StoreFuture<'_, ()>;

    /// Number of stored checkpoints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the count query fails.
    fn count(&self) -> StoreFuture<'_, usize>;
}

/// Open the checkpoint store selected by configuration.
///
/// # Errors
///
/// Returns `AppError::Db` if the `SQLite` file cannot be opened or its schema
/// cannot be applied.
pub async fn open_store(config: &GlobalConfig) -> Result<Arc<dyn CheckpointStore>> {
    if let Some(ref path) = config.checkpoint_db {
        let pool = db::connect(path).await?;
        info!(path = %path.display(), "using sqlite checkpoint store");
        Ok(Arc::new(CheckpointRepo::new(Arc::new(pool))))
    } else {
        info!("using in-memory checkpoint store");
        Ok(Arc::new(MemoryCheckpointStore::default()))
    }
}
