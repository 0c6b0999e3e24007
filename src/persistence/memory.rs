//! Process-lifetime checkpoint store.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{CheckpointStore, StoreFuture};
use crate::models::checkpoint::Checkpoint;

/// In-memory checkpoint map; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: RwLock<HashMap<String, Checkpoint>>,
}

impl CheckpointStore for MemoryCheckpointStore {
    fn get(&self, session_id: &str) -> StoreFuture<'_, Option<Checkpoint>> {
        let key = session_id.to_owned();
        Box::pin(async move { Ok(self.entries.read().await.get(&key).cloned()) })
    }

    fn put(&self, checkpoint: Checkpoint) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.entries
                .write()
                .await
                .insert(checkpoint.session_id.clone(), checkpoint);
            Ok(())
        })
    }

    fn delete(&self, session_id: &str) -> StoreFuture<'_, ()> {
        let key = session_id.to_owned();
        Box::pin(async move {
            self.entries.write().await.remove(&key);
            Ok(())
        })
    }

    fn clear_all(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.entries.write().await.clear();
            Ok(())
        })
    }

    fn count(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move { Ok(self.entries.read().await.len()) })
    }
}
