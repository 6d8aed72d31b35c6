//! Runtime wiring: startup drain of a leftover queue, state reporting and the
//! production graph against a stub backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use staffsync_core::JobId;
use staffsync_offline::{
    Action, ActionStore, ConnectivityState, InMemoryActionStore, InMemoryMarketplace,
    OfflineRuntime, SqliteActionStore, StaticProbe, Submission, SyncConfig,
};

fn job(id: &str) -> JobId {
    JobId::parse(id).unwrap()
}

async fn empty_eventually(store: &dyn ActionStore) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while store.count().await.unwrap() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "queue was not drained");
}

#[tokio::test]
async fn leftover_queue_drains_at_startup_when_online() {
    staffsync_observability::init_for_tests();
    let store = InMemoryActionStore::arc();
    store.enqueue(Action::apply(job("J1"), None)).await.unwrap();
    store.enqueue(Action::apply(job("J2"), None)).await.unwrap();
    let api = InMemoryMarketplace::arc();

    let runtime = OfflineRuntime::assemble(
        store.clone(),
        api.clone(),
        Arc::new(StaticProbe::connected()),
        &SyncConfig::default(),
    )
    .await;

    empty_eventually(store.as_ref()).await;
    assert_eq!(api.call_count(), 2);
    assert_eq!(
        runtime.state(),
        ConnectivityState {
            is_connected: true,
            is_replaying_queue: false,
        }
    );

    runtime.shutdown().await;
}

#[tokio::test]
async fn offline_start_queues_until_the_probe_sees_the_network() {
    let store = InMemoryActionStore::arc();
    let api = InMemoryMarketplace::arc();
    api.set_reachable(false);
    let probe = Arc::new(StaticProbe::disconnected());

    let runtime = OfflineRuntime::assemble(
        store.clone(),
        api.clone(),
        probe.clone(),
        &SyncConfig::default(),
    )
    .await;
    assert!(!runtime.state().is_connected);

    let submission = runtime.client().apply(job("J1"), None).await.unwrap();
    assert!(submission.is_queued());
    assert_eq!(runtime.client().pending_count().await.unwrap(), 1);
    assert!(api.applications().is_empty());

    api.set_reachable(true);
    probe.set(Some(true));
    runtime.monitor().refresh().await;

    empty_eventually(store.as_ref()).await;
    assert_eq!(api.call_count(), 2);
    assert_eq!(api.applications().len(), 1);
    assert!(runtime.state().is_connected);

    runtime.shutdown().await;
}

#[tokio::test]
async fn state_serializes_for_the_presentation_layer() {
    let state = ConnectivityState {
        is_connected: false,
        is_replaying_queue: true,
    };
    assert_eq!(
        serde_json::to_value(state).unwrap(),
        json!({ "isConnected": false, "isReplayingQueue": true })
    );
}

#[tokio::test]
async fn start_wires_sqlite_and_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/applications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "A1",
            "jobId": "J1",
            "status": "pending",
            "receivedAt": "2026-03-01T09:30:00Z",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("staffsync").join("queue.db");
    let config = SyncConfig::default()
        .with_api_url(server.uri())
        .with_queue_db_path(&db_path)
        .with_request_timeout(Duration::from_secs(5));

    let runtime = OfflineRuntime::start(config).await.unwrap();
    assert!(runtime.state().is_connected);

    let submission = runtime.client().apply(job("J1"), None).await.unwrap();
    assert!(matches!(submission, Submission::Completed(_)));
    assert_eq!(runtime.client().pending_count().await.unwrap(), 0);
    runtime.shutdown().await;

    let reopened = SqliteActionStore::open(&db_path).await.unwrap();
    assert_eq!(reopened.count().await.unwrap(), 0);
}
