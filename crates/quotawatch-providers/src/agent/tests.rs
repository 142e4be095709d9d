use super::*;
use crate::client::MockQuotaClient;
use crate::error::ProviderError;
use chrono::{DateTime, Duration as ChronoDuration};
use quotawatch_core::{CycleStore, QuotaReading};
use quotawatch_store::SessionKind;

fn synthetic(captured_at: DateTime<Utc>, used: f64) -> Snapshot {
    Snapshot::new(Provider::Synthetic, captured_at).with_reading(
        QuotaReading::new("subscription", 1000.0, used)
            .with_reset(captured_at + ChronoDuration::days(1)),
    )
}

fn mock_client(used: f64) -> MockQuotaClient {
    let mut client = MockQuotaClient::new();
    client.expect_provider().return_const(Provider::Synthetic);
    client
        .expect_fetch_snapshot()
        .returning(move |at| Ok(synthetic(at, used)));
    client
}

async fn setup(client: MockQuotaClient, interval: Duration) -> (SqliteStore, Arc<Tracker>, Agent) {
    let store = SqliteStore::in_memory().await.unwrap();
    let tracker = Arc::new(Tracker::new(Arc::new(store.scoped(Provider::Synthetic))));
    let agent = Agent::new(Arc::new(client), store.clone(), tracker.clone(), interval);
    (store, tracker, agent)
}

async fn open_session(store: &SqliteStore) -> Session {
    let session = Session::start(Provider::Synthetic, Utc::now(), 60);
    store.create_session(&session).await.unwrap();
    session
}

#[tokio::test]
async fn test_poll_stores_and_tracks() {
    let (store, _tracker, agent) = setup(mock_client(120.0), Duration::from_secs(60)).await;
    let session = open_session(&store).await;

    let snapshot = agent
        .poll(session.id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(snapshot.reading("subscription").unwrap().used, 120.0);

    let latest = store
        .query_latest_snapshot(Provider::Synthetic)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.captured_at, snapshot.captured_at);

    let cycle = store
        .scoped(Provider::Synthetic)
        .query_active_cycle("subscription")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cycle.peak_used, 120.0);

    let stored = store.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.snapshot_count, 1);
    let peaks = store.session_peaks(session.id).await.unwrap();
    assert_eq!(peaks.len(), 1);
    assert_eq!(peaks[0].max_used, 120.0);
}

#[tokio::test]
async fn test_fetch_error_skips_tick() {
    let mut client = MockQuotaClient::new();
    client.expect_provider().return_const(Provider::Synthetic);
    client
        .expect_fetch_snapshot()
        .returning(|_| Err(ProviderError::RateLimited { retry_after_secs: Some(60) }));
    let (store, _tracker, agent) = setup(client, Duration::from_secs(60)).await;
    let session = open_session(&store).await;

    assert!(agent
        .poll(session.id, &CancellationToken::new())
        .await
        .is_none());
    assert!(store
        .query_latest_snapshot(Provider::Synthetic)
        .await
        .unwrap()
        .is_none());
    let stored = store.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.snapshot_count, 0);
}

#[tokio::test]
async fn test_cancelled_poll_does_not_fetch() {
    let mut client = MockQuotaClient::new();
    client.expect_provider().return_const(Provider::Synthetic);
    client.expect_fetch_snapshot().never();
    let (store, _tracker, agent) = setup(client, Duration::from_secs(60)).await;
    let session = open_session(&store).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(agent.poll(session.id, &cancel).await.is_none());
}

#[tokio::test]
async fn test_run_polls_immediately_and_closes_session() {
    let (store, _tracker, agent) = setup(mock_client(50.0), Duration::from_secs(3600)).await;

    // Leftover from a run that crashed
    let orphan = open_session(&store).await;

    let agent = Arc::new(agent);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let agent = agent.clone();
        let cancel = cancel.clone();
        async move { agent.run(cancel).await }
    });

    let mut polled = false;
    for _ in 0..100 {
        let sessions = store.list_sessions(10).await.unwrap();
        if sessions
            .iter()
            .any(|s| s.id != orphan.id && s.snapshot_count == 1)
        {
            polled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(polled, "first poll should happen without waiting a tick");

    cancel.cancel();
    handle.await.unwrap().unwrap();

    let sessions = store.list_sessions(10).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| !s.is_open()));
}

#[tokio::test]
async fn test_threshold_alerts_once_until_usage_drops() {
    let mut client = MockQuotaClient::new();
    client.expect_provider().return_const(Provider::Synthetic);
    let mut series = vec![950.0, 960.0, 10.0].into_iter();
    client
        .expect_fetch_snapshot()
        .times(3)
        .returning(move |at| Ok(synthetic(at, series.next().unwrap_or(0.0))));
    let (store, _tracker, agent) = setup(client, Duration::from_secs(60)).await;
    let agent = agent.with_alert_threshold(90.0);
    let session = open_session(&store).await;
    let cancel = CancellationToken::new();

    agent.poll(session.id, &cancel).await.unwrap();
    assert!(agent.alerted.lock().await.contains("subscription"));

    agent.poll(session.id, &cancel).await.unwrap();
    assert_eq!(agent.alerted.lock().await.len(), 1);

    agent.poll(session.id, &cancel).await.unwrap();
    assert!(agent.alerted.lock().await.is_empty());
}

#[tokio::test]
async fn test_polling_check_skips_fetch() {
    let mut client = MockQuotaClient::new();
    client.expect_provider().return_const(Provider::Synthetic);
    client.expect_fetch_snapshot().never();
    let (store, _tracker, agent) = setup(client, Duration::from_secs(60)).await;
    let agent = agent.with_polling_check(|| false);
    let session = open_session(&store).await;

    assert!(agent
        .poll(session.id, &CancellationToken::new())
        .await
        .is_none());
    assert!(store
        .query_latest_snapshot(Provider::Synthetic)
        .await
        .unwrap()
        .is_none());
    let stored = store.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.snapshot_count, 0);
}

#[tokio::test]
async fn test_polling_switch_resumes_fetching() {
    let mut client = MockQuotaClient::new();
    client.expect_provider().return_const(Provider::Synthetic);
    client
        .expect_fetch_snapshot()
        .times(1)
        .returning(|at| Ok(synthetic(at, 75.0)));
    let (store, _tracker, agent) = setup(client, Duration::from_secs(60)).await;
    let switch = PollingSwitch::new(false);
    let agent = agent.with_polling_check({
        let switch = switch.clone();
        move || switch.is_enabled()
    });
    let session = open_session(&store).await;
    let cancel = CancellationToken::new();

    assert!(agent.poll(session.id, &cancel).await.is_none());

    switch.set(true);
    let snapshot = agent.poll(session.id, &cancel).await.unwrap();
    assert_eq!(snapshot.reading("subscription").unwrap().used, 75.0);
}

#[tokio::test]
async fn test_poll_feeds_usage_sessions() {
    let mut client = MockQuotaClient::new();
    client.expect_provider().return_const(Provider::Synthetic);
    let mut series = vec![100.0, 140.0].into_iter();
    client
        .expect_fetch_snapshot()
        .times(2)
        .returning(move |at| Ok(synthetic(at, series.next().unwrap_or(0.0))));
    let (store, _tracker, agent) = setup(client, Duration::from_secs(60)).await;
    let agent = agent.with_usage_sessions(Duration::from_secs(600));
    let session = open_session(&store).await;
    let cancel = CancellationToken::new();

    agent.poll(session.id, &cancel).await.unwrap();
    assert!(agent.usage_sessions.as_ref().unwrap().current().await.is_none());

    agent.poll(session.id, &cancel).await.unwrap();
    let usage_id = agent
        .usage_sessions
        .as_ref()
        .unwrap()
        .current()
        .await
        .unwrap();

    let usage = store.get_session(usage_id).await.unwrap().unwrap();
    assert_eq!(usage.kind, SessionKind::Usage);
    let peaks = store.session_peaks(usage_id).await.unwrap();
    assert_eq!(peaks[0].consumed(), 40.0);
}
