//! Device-code login routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::auth::AuthStatus;

/// Poll interval used when the client does not send one.
const DEFAULT_POLL_INTERVAL: u64 = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/url", get(begin_login))
        .route("/callback", post(start_polling))
        .route("/status", get(status))
        .route("/logout", delete(logout))
        .route("/cancel", post(cancel))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCodeResponse {
    pub verification_uri: String,
    pub user_code: String,
    pub device_code: String,
    pub expires_in: u64,
    pub interval: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    #[serde(default)]
    pub device_code: String,
    pub interval: Option<u64>,
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
}

async fn begin_login(State(state): State<AppState>) -> ApiResult<Json<DeviceCodeResponse>> {
    let code = state.login.begin().await?;
    Ok(Json(DeviceCodeResponse {
        verification_uri: code.verification_uri,
        user_code: code.user_code,
        device_code: code.device_code,
        expires_in: code.expires_in,
        interval: code.poll_interval,
    }))
}

async fn start_polling(
    State(state): State<AppState>,
    Json(request): Json<CallbackRequest>,
) -> ApiResult<(StatusCode, Json<StatusMessage>)> {
    if request.device_code.trim().is_empty() {
        return Err(ApiError::validation("deviceCode is required"));
    }
    let interval = request.interval.unwrap_or(DEFAULT_POLL_INTERVAL).max(1);
    state
        .login
        .start_polling(request.device_code, interval, request.expires_in);
    Ok((StatusCode::ACCEPTED, Json(StatusMessage { status: "polling" })))
}

async fn status(State(state): State<AppState>) -> Json<AuthStatus> {
    Json(state.login.status())
}

async fn logout(State(state): State<AppState>) -> ApiResult<Json<StatusMessage>> {
    state.miner.stop().await;
    state.login.logout()?;
    Ok(Json(StatusMessage {
        status: "logged out",
    }))
}

async fn cancel(State(state): State<AppState>) -> Json<StatusMessage> {
    let status = if state.login.cancel() {
        "cancelled"
    } else {
        "idle"
    };
    Json(StatusMessage { status })
}
