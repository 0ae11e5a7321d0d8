//! Conflict ledger
//!
//! Mutations rejected with a version conflict are parked here together with
//! the field diff against the server's copy. Nothing in the ledger is ever
//! retried; records leave only through an explicit dismissal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::diff::FieldDiff;
use crate::mutation::{MutationId, QueuedMutation};
use crate::storage::Storage;

/// A mutation the server refused because its base version was stale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub mutation: QueuedMutation,
    pub diff: Vec<FieldDiff>,
    pub recorded_at: DateTime<Utc>,
}

impl ConflictRecord {
    pub fn fields(&self) -> Vec<String> {
        self.diff.iter().map(|d| d.field.clone()).collect()
    }
}

/// Persisted list of conflict records under one storage key
pub struct ConflictLedger<S> {
    storage: Arc<S>,
    key: String,
    write_lock: Mutex<()>,
}

impl<S: Storage> ConflictLedger<S> {
    pub fn new(storage: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn record(&self, record: ConflictRecord) -> crate::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.list().await?;
        records.push(record);
        self.write(&records).await
    }

    pub async fn list(&self) -> crate::Result<Vec<ConflictRecord>> {
        let Some(raw) = self.storage.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!("Conflict ledger under {:?} is unreadable, treating as empty: {}", self.key, e);
                Ok(Vec::new())
            }
        }
    }

    pub async fn len(&self) -> crate::Result<usize> {
        Ok(self.list().await?.len())
    }

    /// Remove the record for `id` once a person has dealt with it
    pub async fn dismiss(&self, id: &MutationId) -> crate::Result<Option<ConflictRecord>> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.list().await?;
        let Some(index) = records.iter().position(|r| &r.mutation.id == id) else {
            return Ok(None);
        };
        let dismissed = records.remove(index);
        self.write(&records).await?;
        Ok(Some(dismissed))
    }

    async fn write(&self, records: &[ConflictRecord]) -> crate::Result<()> {
        if records.is_empty() {
            return self.storage.remove(&self.key).await;
        }
        let json = serde_json::to_string(records)?;
        self.storage.set(&self.key, json).await
    }
}
