//! Persisted FIFO of pending mutations
//!
//! The store keeps no cached copy. Every write starts from the list as it
//! is persisted right now, so an append made while a flush is suspended on
//! the network survives the flush's own remove/update. Read-modify-write
//! cycles of handles cloned from one store are serialized by a shared lock.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::mutation::{MutationId, QueuedMutation};
use crate::storage::Storage;

/// Owns the pending mutation list under one storage key
pub struct QueueStore<S> {
    storage: Arc<S>,
    key: String,
    write_lock: Arc<Mutex<()>>,
}

impl<S> Clone for QueueStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            key: self.key.clone(),
            write_lock: Arc::clone(&self.write_lock),
        }
    }
}

impl<S: Storage> QueueStore<S> {
    pub fn new(storage: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append at the tail with a fresh identity and `retries = 0`
    pub async fn append(&self, mut mutation: QueuedMutation) -> crate::Result<QueuedMutation> {
        mutation.id = MutationId::generate();
        mutation.retries = 0;

        let _guard = self.write_lock.lock().await;
        let mut items = self.read().await?;
        items.push(mutation.clone());
        self.write(&items).await?;

        tracing::debug!("Queued {} [{}], {} pending", mutation.describe(), mutation.id, items.len());
        Ok(mutation)
    }

    /// Current list, for a flush pass to iterate or a UI to display
    pub async fn snapshot(&self) -> crate::Result<Vec<QueuedMutation>> {
        self.read().await
    }

    pub async fn len(&self) -> crate::Result<usize> {
        Ok(self.read().await?.len())
    }

    pub async fn is_empty(&self) -> crate::Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove the first item matching `predicate`; returns whether one was found
    pub async fn remove_one<P>(&self, predicate: P) -> crate::Result<bool>
    where
        P: Fn(&QueuedMutation) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read().await?;
        let Some(index) = items.iter().position(|m| predicate(m)) else {
            return Ok(false);
        };
        items.remove(index);
        self.write(&items).await?;
        Ok(true)
    }

    /// Apply `patch` to the first item matching `predicate`; returns whether one was found
    pub async fn update_one<P, F>(&self, predicate: P, patch: F) -> crate::Result<bool>
    where
        P: Fn(&QueuedMutation) -> bool,
        F: FnOnce(&mut QueuedMutation),
    {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read().await?;
        let Some(item) = items.iter_mut().find(|m| predicate(m)) else {
            return Ok(false);
        };
        patch(item);
        self.write(&items).await?;
        Ok(true)
    }

    pub async fn remove(&self, id: &MutationId) -> crate::Result<bool> {
        self.remove_one(|m| &m.id == id).await
    }

    pub async fn update<F>(&self, id: &MutationId, patch: F) -> crate::Result<bool>
    where
        F: FnOnce(&mut QueuedMutation),
    {
        self.update_one(|m| &m.id == id, patch).await
    }

    /// Drop the persisted key; a no-op when nothing is stored
    pub async fn clear(&self) -> crate::Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.storage.get(&self.key).await?.is_none() {
            return Ok(());
        }
        self.storage.remove(&self.key).await?;
        tracing::info!("Cleared offline queue");
        Ok(())
    }

    async fn read(&self) -> crate::Result<Vec<QueuedMutation>> {
        let Some(raw) = self.storage.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!("Persisted queue under {:?} is unreadable, treating as empty: {}", self.key, e);
                Ok(Vec::new())
            }
        }
    }

    // An emptied queue is stored as an absent key
    async fn write(&self, items: &[QueuedMutation]) -> crate::Result<()> {
        if items.is_empty() {
            return self.storage.remove(&self.key).await;
        }
        let json = serde_json::to_string(items)?;
        self.storage.set(&self.key, json).await
    }
}
