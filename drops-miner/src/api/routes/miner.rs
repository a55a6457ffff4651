//! Miner control routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::domain::{LogEvent, StatusSnapshot};
use crate::store::LOG_RETENTION;

const DEFAULT_LOG_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/status", get(status))
        .route("/logs", get(logs))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinerActionResponse {
    /// Whether this call changed the running state.
    pub changed: bool,
    pub status: StatusSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

async fn start(State(state): State<AppState>) -> ApiResult<Json<MinerActionResponse>> {
    let changed = state.miner.start().await?;
    Ok(Json(MinerActionResponse {
        changed,
        status: state.miner.status(),
    }))
}

async fn stop(State(state): State<AppState>) -> Json<MinerActionResponse> {
    let changed = state.miner.stop().await;
    Json(MinerActionResponse {
        changed,
        status: state.miner.status(),
    })
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.miner.status())
}

async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Vec<LogEvent>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(LOG_RETENTION);
    Ok(Json(state.store.get_logs(limit)?))
}
