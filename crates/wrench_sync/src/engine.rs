//! Flush engine
//!
//! Drains the offline queue against a [`Transport`], one item at a time in
//! FIFO order. Every outcome is written back immediately so a crash costs
//! at most the item that was on the wire.

use chrono::TimeDelta;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use wrench_common::MessageSanitizer;

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::diff::{diff, FieldDiff};
use crate::ledger::{ConflictLedger, ConflictRecord};
use crate::mutation::{MutationId, QueuedMutation, Request};
use crate::queue::QueueStore;
use crate::storage::Storage;
use crate::transport::{Transport, TransportError};

type FlushPass = Shared<BoxFuture<'static, crate::Result<FlushReport>>>;

/// What one flush pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Items handed to the transport (conflict follow-up reads not counted)
    pub attempted: usize,
    pub delivered: usize,
    /// Skipped because their backoff had not elapsed
    pub deferred: usize,
    pub retried: usize,
    pub conflicted: usize,
    pub dropped: usize,
}

/// Notifications for the host application
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Retries exhausted; the mutation is gone from the queue
    MutationDropped {
        mutation: QueuedMutation,
        summary: String,
    },

    /// A conflict record was added to the ledger
    ConflictRecorded {
        mutation_id: MutationId,
        fields: Vec<String>,
    },
}

/// Offline mutation queue with its flush engine
pub struct SyncEngine<S, T, C = SystemClock> {
    inner: Arc<EngineInner<S, T, C>>,
}

impl<S, T, C> Clone for SyncEngine<S, T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<S, T, C> {
    config: SyncConfig,
    store: QueueStore<S>,
    ledger: ConflictLedger<S>,
    transport: T,
    clock: C,
    sanitizer: MessageSanitizer,
    events: broadcast::Sender<SyncEvent>,
    in_flight: Mutex<Option<FlushPass>>,
}

impl<S, T, C> SyncEngine<S, T, C>
where
    S: Storage + 'static,
    T: Transport + 'static,
    C: Clock + 'static,
{
    /// Create new sync engine
    pub fn new(config: SyncConfig, storage: Arc<S>, transport: T, clock: C) -> crate::Result<Self> {
        config.validate()?;

        let (events, _) = broadcast::channel(config.event_capacity);
        let store = QueueStore::new(Arc::clone(&storage), config.queue_key.clone());
        let ledger = ConflictLedger::new(storage, config.conflict_key.clone());

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                store,
                ledger,
                transport,
                clock,
                sanitizer: MessageSanitizer::new(),
                events,
                in_flight: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Append a mutation to the tail of the queue
    pub async fn add(&self, mutation: QueuedMutation) -> crate::Result<QueuedMutation> {
        self.inner.store.append(mutation).await
    }

    /// Attempt every eligible queued mutation once
    ///
    /// Overlapping calls join the pass already running and receive its
    /// report; `enable_backoff` of a joining call is ignored. Per-item
    /// failures are absorbed into the report, only storage errors are
    /// returned.
    pub async fn flush(&self, enable_backoff: bool) -> crate::Result<FlushReport> {
        let pass = {
            let mut slot = self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(pass) => {
                    tracing::debug!("Flush already in progress, joining it");
                    pass.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let pass = async move {
                        let outcome = inner.run_pass(enable_backoff).await;
                        *inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = None;
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pass.clone());
                    pass
                }
            }
        };

        pass.await
    }

    /// [`flush`](Self::flush) while handing every event of the pass to `on_event`
    ///
    /// Events are drained as they are emitted, so no notice is lost however
    /// many items the pass drops. A call that joins a pass already running
    /// only sees the events emitted after it joined.
    pub async fn flush_observed<F>(&self, enable_backoff: bool, mut on_event: F) -> crate::Result<FlushReport>
    where
        F: FnMut(SyncEvent),
    {
        let mut events = self.subscribe();
        let flush = self.flush(enable_backoff);
        tokio::pin!(flush);

        let outcome = loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Ok(event) => on_event(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("Missed {} sync events", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break (&mut flush).await,
                },
                outcome = &mut flush => break outcome,
            }
        };

        while let Ok(event) = events.try_recv() {
            on_event(event);
        }
        outcome
    }

    pub fn is_flushing(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Remove every pending mutation; conflict records are kept
    pub async fn clear(&self) -> crate::Result<()> {
        self.inner.store.clear().await
    }

    pub async fn len(&self) -> crate::Result<usize> {
        self.inner.store.len().await
    }

    pub async fn is_empty(&self) -> crate::Result<bool> {
        self.inner.store.is_empty().await
    }

    /// Pending mutations in attempt order
    pub async fn pending(&self) -> crate::Result<Vec<QueuedMutation>> {
        self.inner.store.snapshot().await
    }

    pub async fn conflicts(&self) -> crate::Result<Vec<ConflictRecord>> {
        self.inner.ledger.list().await
    }

    pub async fn dismiss_conflict(&self, id: &MutationId) -> crate::Result<Option<ConflictRecord>> {
        self.inner.ledger.dismiss(id).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }
}

impl<S, T, C> EngineInner<S, T, C>
where
    S: Storage,
    T: Transport,
    C: Clock,
{
    async fn run_pass(&self, enable_backoff: bool) -> crate::Result<FlushReport> {
        let snapshot = self.store.snapshot().await?;
        let mut report = FlushReport::default();
        if snapshot.is_empty() {
            return Ok(report);
        }

        tracing::info!("Flushing {} queued mutations", snapshot.len());

        for mutation in snapshot {
            if mutation.is_deferred(self.clock.now()) {
                tracing::debug!("Deferring {} until {:?}", mutation.describe(), mutation.next_attempt);
                report.deferred += 1;
                continue;
            }

            report.attempted += 1;
            tracing::debug!("Sending {} [{}]", mutation.describe(), mutation.id);
            let outcome = self.transport.execute(&mutation.request()).await;

            match outcome {
                Ok(_) => {
                    self.store.remove(&mutation.id).await?;
                    tracing::info!("Delivered {}", mutation.describe());
                    report.delivered += 1;
                }
                Err(error) if self.transport.is_conflict(&error) => {
                    self.park_conflict(mutation, &error).await?;
                    report.conflicted += 1;
                }
                Err(error) => {
                    if self.record_failure(mutation, &error, enable_backoff).await? {
                        report.dropped += 1;
                    } else {
                        report.retried += 1;
                    }
                }
            }
        }

        tracing::info!(
            "Flush finished: {} delivered, {} retrying, {} conflicted, {} dropped, {} deferred",
            report.delivered,
            report.retried,
            report.conflicted,
            report.dropped,
            report.deferred
        );
        Ok(report)
    }

    /// Publish, then let observers drain before the next item is processed
    async fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
        tokio::task::yield_now().await;
    }

    /// Fetch the server copy, diff it, ledger the conflict and unqueue
    async fn park_conflict(&self, mut mutation: QueuedMutation, error: &TransportError) -> crate::Result<()> {
        tracing::warn!("Version conflict on {}: {}", mutation.describe(), error);

        let server_state = match self.transport.execute(&Request::get(mutation.url.clone())).await {
            Ok(state) => state,
            Err(read_error) => {
                tracing::warn!(
                    "Could not read server copy of {}: {}",
                    mutation.url,
                    self.sanitizer.sanitize(&read_error.to_string())
                );
                Value::Null
            }
        };

        let field_diff: Vec<FieldDiff> = diff(&mutation.data, &server_state)
            .into_iter()
            .map(FieldDiff::into_owned)
            .collect();

        mutation.error = Some(self.sanitizer.sanitize(&error.to_string()));
        let id = mutation.id.clone();
        let record = ConflictRecord {
            mutation,
            diff: field_diff,
            recorded_at: self.clock.now(),
        };
        let fields = record.fields();

        self.ledger.record(record).await?;
        self.store.remove(&id).await?;

        self.emit(SyncEvent::ConflictRecorded {
            mutation_id: id,
            fields,
        })
        .await;
        Ok(())
    }

    /// Returns true when the mutation was dropped
    async fn record_failure(
        &self,
        mutation: QueuedMutation,
        error: &TransportError,
        enable_backoff: bool,
    ) -> crate::Result<bool> {
        let message = self.sanitizer.sanitize(&error.to_string());
        let next_retries = mutation.retries.saturating_add(1);
        let policy = &self.config.retry;

        if next_retries >= policy.max_retries {
            self.store.remove(&mutation.id).await?;

            let summary = format!(
                "Gave up on {} after {} attempts: {}",
                mutation.describe(),
                next_retries,
                message
            );
            tracing::error!("{}", summary);
            self.emit(SyncEvent::MutationDropped { mutation, summary }).await;
            return Ok(true);
        }

        let delay = if enable_backoff {
            policy.delay(next_retries)
        } else {
            Duration::ZERO
        };
        // a delay past the representable range makes the item due on the next flush
        let now = self.clock.now();
        let next_attempt = TimeDelta::from_std(delay)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(now);

        tracing::warn!(
            "{} failed (attempt {}/{}), next try at {}: {}",
            mutation.describe(),
            next_retries,
            policy.max_retries,
            next_attempt,
            message
        );

        let updated = self
            .store
            .update(&mutation.id, |m| {
                m.retries = next_retries;
                m.next_attempt = Some(next_attempt);
                m.error = Some(message);
            })
            .await?;
        if !updated {
            tracing::debug!("{} left the queue while in flight", mutation.id);
        }
        Ok(false)
    }
}
