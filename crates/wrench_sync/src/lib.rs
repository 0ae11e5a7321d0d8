//! # Wrench Sync Engine
//!
//! Offline mutation queue for field technicians: create/update/delete
//! actions are recorded locally while the server is unreachable and
//! replayed in order once connectivity returns.
//!
//! ## Architecture
//!
//! - **Ports**: [`Storage`], [`Clock`] and [`Transport`] are injected, so hosts
//!   and tests decide where lists are persisted and how requests travel
//! - **Queue Store**: FIFO list of [`QueuedMutation`]s, every write re-reads
//!   the persisted list first
//! - **Flush Engine**: single-flight replay with bounded retries and backoff
//! - **Conflicts**: 409 responses are diffed against the server's copy and
//!   parked in the [`ConflictLedger`] for human review
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wrench_sync::{MemoryStorage, SyncConfig, SyncEngine, SystemClock, Verb};
//! # use wrench_sync::{Request, Transport, TransportError};
//! # struct Http;
//! # #[async_trait::async_trait]
//! # impl Transport for Http {
//! #     async fn execute(&self, _: &Request) -> Result<serde_json::Value, TransportError> {
//! #         Ok(serde_json::Value::Null)
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> wrench_sync::Result<()> {
//!     let engine = SyncEngine::new(
//!         SyncConfig::default(),
//!         Arc::new(MemoryStorage::new()),
//!         Http,
//!         SystemClock,
//!     )?;
//!
//!     engine
//!         .enqueue_work_order_request(Verb::Update, &serde_json::json!({"id": "wo-17", "status": "closed"}))
//!         .await?;
//!
//!     let report = engine.flush(true).await?;
//!     println!("delivered {}", report.delivered);
//!     Ok(())
//! }
//! ```

pub mod builders;
pub mod clock;
pub mod config;
pub mod diff;
pub mod engine;
pub mod ledger;
pub mod mutation;
pub mod queue;
pub mod storage;
pub mod transport;

pub use builders::{Collection, Verb};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RetryPolicy, SyncConfig, MAX_BACKOFF};
pub use diff::{diff, FieldDiff, Node, Structural};
pub use engine::{FlushReport, SyncEngine, SyncEvent};
pub use ledger::{ConflictLedger, ConflictRecord};
pub use mutation::{Method, MutationId, MutationMeta, QueuedMutation, Request};
pub use queue::QueueStore;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use transport::{Transport, TransportError};

/// Common result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during sync operations
///
/// Per-item transport failures are classified inside the flush engine and
/// never surface here. `Clone` lets one flush outcome be handed to every
/// caller that joined the same pass.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Storage(e.to_string())
    }
}
