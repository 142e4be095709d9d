//! Agent session endpoints
//!
//! GET /api/v1/sessions       - Recent sessions, newest first
//! GET /api/v1/sessions/:id   - One session with its per-quota peaks

use super::response::{ok, ApiError, ApiResult};
use super::ApiState;
use axum::extract::{Extension, Path, Query};
use axum::routing::get;
use axum::Router;
use quotawatch_store::{Session, SessionPeak};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub limit: Option<i64>,
}

/// A session and the usage range of each quota during it
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,
    pub peaks: Vec<SessionPeak>,
}

async fn list_sessions(
    Extension(state): Extension<ApiState>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Vec<Session>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    ok(state.store.list_sessions(limit).await?)
}

async fn get_session(
    Extension(state): Extension<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionDetail> {
    let session = state
        .store
        .get_session(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session not found: {id}")))?;
    let peaks = state.store.session_peaks(id).await?;
    ok(SessionDetail { session, peaks })
}

/// Create session routes
pub fn sessions_routes() -> Router {
    Router::new()
        .route("/api/v1/sessions", get(list_sessions))
        .route("/api/v1/sessions/:id", get(get_session))
}
