//! Queue and ledger writes racing each other across storage suspensions

use serde_json::json;
use std::sync::Arc;
use wrench_sync::{
    ConflictLedger, ConflictRecord, ManualClock, Method, QueueStore, QueuedMutation, SyncConfig, SyncEngine,
};
use wrench_test_helpers::prelude::*;

fn put(url: &str) -> QueuedMutation {
    QueuedMutation::new(Method::Put, url, json!({"status": "done"}))
}

fn urls(items: Vec<QueuedMutation>) -> Vec<String> {
    items.into_iter().map(|m| m.url).collect()
}

#[tokio::test]
async fn test_remove_and_append_interleaved() {
    let store = QueueStore::new(Arc::new(YieldingStorage::new()), "offline-queue");
    let a = store.append(put("/api/assets/1")).await.unwrap();

    let (removed, appended) = tokio::join!(store.remove(&a.id), store.append(put("/api/assets/2")));
    assert!(removed.unwrap());
    appended.unwrap();

    assert_eq!(urls(store.snapshot().await.unwrap()), vec!["/api/assets/2"]);
}

#[tokio::test]
async fn test_update_and_append_interleaved() {
    let store = QueueStore::new(Arc::new(YieldingStorage::new()), "offline-queue");
    let a = store.append(put("/api/parts/1")).await.unwrap();

    let (updated, appended) = tokio::join!(
        store.update(&a.id, |m| m.retries = 3),
        store.append(put("/api/parts/2"))
    );
    assert!(updated.unwrap());
    appended.unwrap();

    let items = store.snapshot().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].retries, 3);
    assert_eq!(items[1].url, "/api/parts/2");
}

#[tokio::test]
async fn test_add_while_flush_writes_back() {
    suppress_logs();
    let storage = Arc::new(YieldingStorage::new());
    let transport = Arc::new(ScriptedTransport::new());
    let engine = SyncEngine::new(
        SyncConfig::default(),
        Arc::clone(&storage),
        Arc::clone(&transport),
        Arc::new(ManualClock::default()),
    )
    .unwrap();
    engine.add(put("/api/work-orders/a")).await.unwrap();

    for yields in 0..4 {
        let (report, added) = tokio::join!(engine.flush(true), async {
            for _ in 0..yields {
                tokio::task::yield_now().await;
            }
            engine.add(put("/api/work-orders/b")).await
        });
        report.unwrap();
        added.unwrap();

        // a was delivered exactly once and never comes back; b is never lost
        let pending = urls(engine.pending().await.unwrap());
        assert!(!pending.contains(&"/api/work-orders/a".to_string()), "{:?}", pending);
        assert!(pending.contains(&"/api/work-orders/b".to_string()), "{:?}", pending);

        engine.flush(true).await.unwrap();
        assert!(engine.is_empty().await.unwrap());
        engine.add(put("/api/work-orders/a")).await.unwrap();
    }

    let delivered_a = transport
        .calls()
        .iter()
        .filter(|r| r.url == "/api/work-orders/a")
        .count();
    assert_eq!(delivered_a, 4);
}

#[tokio::test]
async fn test_ledger_records_interleaved() {
    let ledger = ConflictLedger::new(Arc::new(YieldingStorage::new()), "offline-conflicts");
    let record = |url: &str| ConflictRecord {
        mutation: put(url),
        diff: Vec::new(),
        recorded_at: Default::default(),
    };
    let first = record("/api/vendors/1");
    let first_id = first.mutation.id.clone();
    ledger.record(first).await.unwrap();

    let (dismissed, recorded) = tokio::join!(ledger.dismiss(&first_id), ledger.record(record("/api/vendors/2")));
    assert!(dismissed.unwrap().is_some());
    recorded.unwrap();

    let remaining = ledger.list().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].mutation.url, "/api/vendors/2");
}
