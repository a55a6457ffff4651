//! API route modules.
//!
//! Organizes routes by resource type.

pub mod auth;
pub mod drops;
pub mod games;
pub mod health;
pub mod miner;
pub mod settings;
pub mod ws;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth::router())
        .nest("/api/v1/games", games::router())
        .nest("/api/v1/settings", settings::router())
        .nest("/api/v1/drops", drops::router())
        .nest("/api/v1/miner", miner::router())
        .nest("/api/v1/ws", ws::router())
        .nest("/api/v1/health", health::router())
        .with_state(state)
}
