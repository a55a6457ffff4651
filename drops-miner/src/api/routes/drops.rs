use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::domain::{DropRecord, LogLevel, LogEvent};
use crate::error::Error;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_drops))
        .route("/{id}/claim", post(claim_drop))
        .route("/{id}/progress", put(update_progress))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRequest {
    current_minutes: u32,
}

async fn list_drops(State(state): State<AppState>) -> ApiResult<Json<Vec<DropRecord>>> {
    Ok(Json(state.store.get_drops()?))
}

/// Marks the drop as claimed locally. No claim request is sent upstream.
async fn claim_drop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DropRecord>> {
    if !state.login.is_authenticated() {
        return Err(ApiError::unauthorized("Not authenticated"));
    }
    let record = state
        .store
        .mark_drop_claimed(&id)?
        .ok_or_else(|| Error::not_found("Drop", id))?;

    state.journal.record(
        LogEvent::new(LogLevel::Success, format!("Claimed {}", record.name))
            .with_game(&record.game_id),
    );
    Ok(Json(record))
}

/// Record watched minutes for a drop; completion follows from the requirement.
async fn update_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ProgressRequest>,
) -> ApiResult<Json<DropRecord>> {
    let record = state
        .store
        .update_drop_progress(&id, request.current_minutes)?
        .ok_or_else(|| Error::not_found("Drop", id))?;

    if record.is_completed {
        state.journal.record(
            LogEvent::new(LogLevel::Info, format!("{} is ready to claim", record.name))
                .with_game(&record.game_id),
        );
    }
    Ok(Json(record))
}
