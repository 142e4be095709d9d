//! Tracker running against the SQLite cycle store

use chrono::{DateTime, Duration, TimeZone, Utc};
use quotawatch_core::{CycleStore, Provider, QuotaReading, Snapshot, Tracker};
use quotawatch_store::SqliteStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()
}

fn copilot(at: DateTime<Utc>, remaining: f64, reset: DateTime<Utc>) -> Snapshot {
    let pct = remaining / 1500.0 * 100.0;
    Snapshot::new(Provider::Copilot, at).with_reading(
        QuotaReading::from_remaining("premium_interactions", 1500.0, remaining)
            .with_percent_remaining(pct)
            .with_reset(reset),
    )
}

async fn feed(store: &SqliteStore, tracker: &Tracker, snapshot: Snapshot) {
    store.insert_snapshot(&snapshot).await.unwrap();
    tracker.process(&snapshot).await.unwrap();
}

#[tokio::test]
async fn tracks_a_monthly_reset() {
    let store = SqliteStore::in_memory().await.unwrap();
    let tracker = Tracker::new(Arc::new(store.scoped(Provider::Copilot)));
    let resets = Arc::new(AtomicUsize::new(0));
    let counter = resets.clone();
    tracker
        .set_on_reset(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    let may = t0() + Duration::days(31);
    let june = may + Duration::days(30);

    feed(&store, &tracker, copilot(t0(), 1500.0, may)).await;
    feed(&store, &tracker, copilot(t0() + Duration::days(10), 1200.0, may)).await;
    feed(&store, &tracker, copilot(t0() + Duration::days(20), 700.0, may)).await;
    feed(&store, &tracker, copilot(may + Duration::hours(1), 1490.0, june)).await;

    assert_eq!(resets.load(Ordering::SeqCst), 1);

    let cycles = store.scoped(Provider::Copilot);
    let history = cycles
        .query_cycle_history("premium_interactions")
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].total_delta, 800.0);
    assert_eq!(history[0].peak_used, 800.0);
    // Closed at the scheduled boundary
    assert_eq!(history[0].cycle_end, Some(may));

    let summary = tracker
        .usage_summary_at("premium_interactions", may + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(summary.completed_cycles, 1);
    assert_eq!(summary.avg_per_cycle, 800.0);
    assert_eq!(summary.current_used, 10.0);
    assert_eq!(summary.reset_date, Some(june));
    assert_eq!(summary.tracking_since, Some(t0()));
}

#[tokio::test]
async fn providers_do_not_share_cycles() {
    let store = SqliteStore::in_memory().await.unwrap();
    let copilot_tracker = Tracker::new(Arc::new(store.scoped(Provider::Copilot)));
    let synthetic_tracker = Tracker::new(Arc::new(store.scoped(Provider::Synthetic)));

    let reset = t0() + Duration::days(1);
    feed(&store, &copilot_tracker, copilot(t0(), 1000.0, reset)).await;
    let synthetic = Snapshot::new(Provider::Synthetic, t0()).with_reading(
        QuotaReading::new("premium_interactions", 50.0, 5.0).with_reset(reset),
    );
    feed(&store, &synthetic_tracker, synthetic).await;

    let copilot_summary = copilot_tracker
        .usage_summary_at("premium_interactions", t0())
        .await
        .unwrap();
    let synthetic_summary = synthetic_tracker
        .usage_summary_at("premium_interactions", t0())
        .await
        .unwrap();
    assert_eq!(copilot_summary.current_used, 500.0);
    assert_eq!(synthetic_summary.current_used, 5.0);
    assert_eq!(synthetic_summary.limit, 50.0);
}

#[tokio::test]
async fn survives_restart_with_file_database() {
    let dir = std::env::temp_dir().join(format!("quotawatch-test-{}", std::process::id()));
    let db_path = dir.join("restart.db");
    let _ = std::fs::remove_file(&db_path);

    let reset = t0() + Duration::days(30);
    {
        let store = SqliteStore::from_path(&db_path).await.unwrap();
        let tracker = Tracker::new(Arc::new(store.scoped(Provider::Copilot)));
        feed(&store, &tracker, copilot(t0(), 1400.0, reset)).await;
        feed(&store, &tracker, copilot(t0() + Duration::hours(1), 1300.0, reset)).await;
    }

    let store = SqliteStore::from_path(&db_path).await.unwrap();
    let tracker = Tracker::new(Arc::new(store.scoped(Provider::Copilot)));
    feed(&store, &tracker, copilot(t0() + Duration::hours(2), 1250.0, reset)).await;

    let active = store
        .scoped(Provider::Copilot)
        .query_active_cycle("premium_interactions")
        .await
        .unwrap()
        .unwrap();
    // The first reading after a restart only raises the peak
    assert_eq!(active.total_delta, 100.0);
    assert_eq!(active.peak_used, 250.0);

    let _ = std::fs::remove_dir_all(&dir);
}
