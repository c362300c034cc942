//! Queue persistence across restarts, backed by the SQLite key-value store.

use pulse_core::application::constants::{ANONYMOUS_ID_STORAGE_KEY, BUFFER_STORAGE_KEY};
use pulse_core::domain::{EventData, QueueConfig};
use pulse_core::port::event_collector::mocks::{MockBehavior, MockCollector};
use pulse_core::port::KeyValueStore;
use pulse_core::EventTracker;
use pulse_infra_sqlite::SqliteKeyValueStore;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn fast_config() -> QueueConfig {
    QueueConfig {
        processing_interval_ms: 20,
        retry_base_delay_ms: 10,
        max_retry_delay_ms: 50,
        retry_jitter_ms: 0,
        max_retries: 1000,
        request_timeout_ms: 1000,
        ..Default::default()
    }
}

/// Temporary database file, removed (with its WAL files) on drop
struct TempDb(PathBuf);

impl TempDb {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("pulse-{}-{}.db", name, std::process::id()));
        let db = Self(path);
        db.cleanup();
        db
    }

    fn path(&self) -> &str {
        self.0.to_str().unwrap()
    }

    fn cleanup(&self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path(), suffix));
        }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        self.cleanup();
    }
}

async fn tracker(db: &TempDb, config: QueueConfig, collector: Arc<MockCollector>) -> EventTracker {
    let store = SqliteKeyValueStore::connect(db.path()).await.unwrap();
    EventTracker::with_defaults(config, Arc::new(store), collector).unwrap()
}

async fn wait_for_calls(collector: &MockCollector, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while collector.call_count() < expected && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_undelivered_events_survive_restart() {
    let db = TempDb::new("restart");

    // Session 1: collector offline, events stay buffered
    let offline = Arc::new(MockCollector::new_fail("offline"));
    let first = tracker(&db, fast_config(), offline.clone()).await;
    first.track_event("job_saved", EventData::new());
    first.track_event("tab_switch", EventData::new());
    first.track_event("page_view", EventData::new());
    wait_for_calls(&offline, 3).await;
    first.stop().await;

    let store = SqliteKeyValueStore::connect(db.path()).await.unwrap();
    let persisted = store.get(BUFFER_STORAGE_KEY).await.unwrap().unwrap();
    assert_eq!(persisted.as_array().unwrap().len(), 3);
    let anonymous_id = store.get(ANONYMOUS_ID_STORAGE_KEY).await.unwrap().unwrap();
    drop(store);

    // Session 2: collector back, everything is delivered
    let online = Arc::new(MockCollector::new_success());
    let second = tracker(&db, fast_config(), online.clone()).await;
    second.start();
    wait_for_calls(&online, 3).await;

    let sent = online.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|p| p["user_id"] == anonymous_id));

    let stats = second.stats().await.unwrap();
    assert_eq!(stats.queue_size, 0);
    second.stop().await;
}

#[tokio::test]
async fn test_restore_keeps_newest_items_within_capacity() {
    let db = TempDb::new("capacity");

    let offline = Arc::new(MockCollector::new(MockBehavior::Hang));
    let first = tracker(&db, fast_config(), offline).await;
    for n in 0..5 {
        let mut data = EventData::new();
        data.insert("n".to_string(), json!(n));
        first.track_event("job_saved", data);
    }
    first.flush().await.unwrap();
    first.stop().await;

    let smaller = QueueConfig {
        max_queue_size: 3,
        ..fast_config()
    };
    let online = Arc::new(MockCollector::new_success());
    let second = tracker(&db, smaller, online.clone()).await;
    second.start();
    wait_for_calls(&online, 3).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut delivered: Vec<i64> = online
        .sent()
        .iter()
        .filter_map(|p| p["n"].as_i64())
        .collect();
    delivered.sort_unstable();
    assert_eq!(delivered, vec![2, 3, 4]);
    second.stop().await;
}

#[tokio::test]
async fn test_anonymous_id_stable_across_sessions() {
    let db = TempDb::new("identity");

    let collector = Arc::new(MockCollector::new_success());
    let first = tracker(&db, fast_config(), collector.clone()).await;
    first.track_event("job_saved", EventData::new());
    wait_for_calls(&collector, 1).await;
    first.stop().await;

    let second = tracker(&db, fast_config(), collector.clone()).await;
    second.track_event("job_saved", EventData::new());
    wait_for_calls(&collector, 2).await;
    second.stop().await;

    let sent = collector.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0]["user_id"].as_str().unwrap().starts_with("anon_"));
    assert_eq!(sent[0]["user_id"], sent[1]["user_id"]);
}
