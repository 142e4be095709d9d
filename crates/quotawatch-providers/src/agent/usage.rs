//! Usage sessions
//!
//! A usage session opens on the first poll where any quota's used value
//! went up and closes once no increase has been seen for the idle
//! timeout. The very first poll only sets the baseline.

use chrono::{DateTime, Utc};
use quotawatch_core::{Provider, Result, Snapshot};
use quotawatch_store::{Session, SqliteStore};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Usage-session bookkeeping for one provider
pub struct UsageSessions {
    store: SqliteStore,
    provider: Provider,
    idle_timeout: chrono::Duration,
    poll_interval_secs: i64,
    state: Mutex<UsageState>,
}

#[derive(Default)]
struct UsageState {
    /// Last reported snapshot
    last: Option<Snapshot>,
    open: Option<OpenSession>,
}

#[derive(Debug, Clone, Copy)]
struct OpenSession {
    id: Uuid,
    last_activity: DateTime<Utc>,
}

impl UsageSessions {
    /// Create a manager that closes sessions after `idle_timeout` without an increase
    #[must_use]
    pub fn new(
        store: SqliteStore,
        provider: Provider,
        idle_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            idle_timeout: chrono::Duration::from_std(idle_timeout)
                .unwrap_or(chrono::Duration::MAX),
            poll_interval_secs: i64::try_from(poll_interval.as_secs()).unwrap_or(i64::MAX),
            state: Mutex::new(UsageState::default()),
        }
    }

    /// Feed one successful poll, timed by its `captured_at`
    pub async fn report_poll(&self, snapshot: &Snapshot) -> Result<()> {
        let now = snapshot.captured_at;
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(open) = state.open {
            if now - open.last_activity >= self.idle_timeout {
                self.store.close_session(open.id, open.last_activity).await?;
                state.open = None;
                info!(
                    provider = %self.provider,
                    session_id = %open.id,
                    "Usage session closed after idle timeout"
                );
            }
        }

        let increased = state
            .last
            .as_ref()
            .is_some_and(|prev| usage_increased(prev, snapshot));

        if increased {
            match state.open.as_mut() {
                Some(open) => open.last_activity = now,
                None => {
                    let session = Session::usage(self.provider, now, self.poll_interval_secs);
                    self.store.create_session(&session).await?;
                    // Peaks start from the values before the increase
                    if let Some(prev) = &state.last {
                        self.store.update_session_peaks(session.id, prev).await?;
                    }
                    state.open = Some(OpenSession {
                        id: session.id,
                        last_activity: now,
                    });
                    info!(provider = %self.provider, session_id = %session.id, "Usage session opened");
                }
            }
        }

        if let Some(open) = state.open {
            self.store.increment_snapshot_count(open.id).await?;
            self.store.update_session_peaks(open.id, snapshot).await?;
        }

        state.last = Some(snapshot.clone());
        Ok(())
    }

    /// Close the open usage session, if any, at its last activity
    pub async fn close(&self) -> Result<()> {
        let open = self.state.lock().await.open.take();
        if let Some(open) = open {
            self.store.close_session(open.id, open.last_activity).await?;
            debug!(provider = %self.provider, session_id = %open.id, "Usage session closed");
        }
        Ok(())
    }

    /// ID of the open usage session
    pub async fn current(&self) -> Option<Uuid> {
        self.state.lock().await.open.map(|open| open.id)
    }
}

/// Whether any quota present in both snapshots has a higher used value now
fn usage_increased(prev: &Snapshot, current: &Snapshot) -> bool {
    current.readings.iter().any(|reading| {
        prev.reading(&reading.name)
            .is_some_and(|before| reading.used > before.used)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quotawatch_core::QuotaReading;
    use quotawatch_store::SessionKind;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()
    }

    fn at(minutes: i64, used: f64) -> Snapshot {
        Snapshot::new(Provider::Copilot, t0() + chrono::Duration::minutes(minutes))
            .with_reading(QuotaReading::from_remaining("premium_interactions", 300.0, 300.0 - used))
    }

    async fn manager() -> (SqliteStore, UsageSessions) {
        let store = SqliteStore::in_memory().await.unwrap();
        let sessions = UsageSessions::new(
            store.clone(),
            Provider::Copilot,
            Duration::from_secs(600),
            Duration::from_secs(60),
        );
        (store, sessions)
    }

    #[tokio::test]
    async fn test_opens_on_increase_and_closes_when_idle() {
        let (store, sessions) = manager().await;

        sessions.report_poll(&at(0, 100.0)).await.unwrap();
        sessions.report_poll(&at(1, 100.0)).await.unwrap();
        assert!(sessions.current().await.is_none());
        assert!(store.list_sessions(10).await.unwrap().is_empty());

        sessions.report_poll(&at(2, 130.0)).await.unwrap();
        let id = sessions.current().await.unwrap();
        sessions.report_poll(&at(5, 130.0)).await.unwrap();
        assert_eq!(sessions.current().await, Some(id));

        let open = store.get_session(id).await.unwrap().unwrap();
        assert_eq!(open.kind, SessionKind::Usage);
        assert_eq!(open.started_at, t0() + chrono::Duration::minutes(2));
        assert_eq!(open.snapshot_count, 2);
        let peaks = store.session_peaks(id).await.unwrap();
        assert_eq!(peaks[0].start_used, 100.0);
        assert_eq!(peaks[0].consumed(), 30.0);

        // Ten idle minutes after the last increase
        sessions.report_poll(&at(12, 130.0)).await.unwrap();
        assert!(sessions.current().await.is_none());
        let closed = store.get_session(id).await.unwrap().unwrap();
        assert_eq!(closed.ended_at, Some(t0() + chrono::Duration::minutes(2)));

        sessions.report_poll(&at(14, 150.0)).await.unwrap();
        let next = sessions.current().await.unwrap();
        assert_ne!(next, id);
        assert_eq!(store.list_sessions(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_usage_drop_is_not_activity() {
        let (store, sessions) = manager().await;

        sessions.report_poll(&at(0, 250.0)).await.unwrap();
        sessions.report_poll(&at(1, 0.0)).await.unwrap();

        assert!(sessions.current().await.is_none());
        assert!(store.list_sessions(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_ends_open_session() {
        let (store, sessions) = manager().await;

        sessions.report_poll(&at(0, 10.0)).await.unwrap();
        sessions.report_poll(&at(3, 20.0)).await.unwrap();
        let id = sessions.current().await.unwrap();

        sessions.close().await.unwrap();
        assert!(sessions.current().await.is_none());
        let closed = store.get_session(id).await.unwrap().unwrap();
        assert_eq!(closed.ended_at, Some(t0() + chrono::Duration::minutes(3)));

        // Nothing left to close
        sessions.close().await.unwrap();
    }
}
