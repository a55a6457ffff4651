use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::domain::{LogLevel, Settings};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.store.get_settings()?))
}

/// Replace settings. A new watch interval applies from the next start.
async fn update_settings(
    State(state): State<AppState>,
    Json(mut settings): Json<Settings>,
) -> ApiResult<Json<Settings>> {
    settings.validate()?;
    settings.updated_at = Some(Utc::now());
    state.store.save_settings(&settings)?;
    state.journal.log(LogLevel::Info, "Settings updated");
    Ok(Json(settings))
}
