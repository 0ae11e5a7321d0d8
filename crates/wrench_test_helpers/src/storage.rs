//! Storage double that suspends inside every read

use async_trait::async_trait;
use wrench_sync::{MemoryStorage, Storage};

/// [`MemoryStorage`] that yields to the scheduler after each `get`
///
/// File-backed storage suspends between reading a list and writing it
/// back; this reproduces that window deterministically.
#[derive(Debug, Default)]
pub struct YieldingStorage {
    inner: MemoryStorage,
}

impl YieldingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }
}

#[async_trait]
impl Storage for YieldingStorage {
    async fn get(&self, key: &str) -> wrench_sync::Result<Option<String>> {
        let value = self.inner.get(key).await?;
        tokio::task::yield_now().await;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> wrench_sync::Result<()> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> wrench_sync::Result<()> {
        self.inner.remove(key).await
    }
}
