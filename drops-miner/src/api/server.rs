//! HTTP server hosting the control API and the push channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::Request;
use axum::response::Response;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, MakeSpan, OnResponse, TraceLayer};
use tracing::{Level, Span, info};

use crate::api::routes;
use crate::auth::LoginService;
use crate::broadcast::Broadcaster;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::miner::{Miner, StreamCatalog};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Allow any origin, so a dashboard served elsewhere can call the API.
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Handles shared by every route.
#[derive(Clone)]
pub struct AppState {
    pub start_time: Instant,
    pub store: Arc<dyn Store>,
    pub login: Arc<LoginService>,
    pub miner: Arc<Miner>,
    pub catalog: Arc<dyn StreamCatalog>,
    pub broadcaster: Arc<Broadcaster>,
    pub journal: Journal,
}

pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

/// Health checks are polled often; keep them out of the request log.
fn is_quiet(path: &str) -> bool {
    path.ends_with("/health")
}

fn request_span(req: &Request) -> Span {
    if is_quiet(req.uri().path()) {
        return Span::none();
    }
    DefaultMakeSpan::new().level(Level::INFO).make_span(req)
}

fn log_response(res: &Response, latency: Duration, span: &Span) {
    if span.is_disabled() {
        return;
    }
    DefaultOnResponse::new()
        .level(Level::DEBUG)
        .on_response(res, latency, span);
}

fn log_failure(failure: ServerErrorsFailureClass, latency: Duration, span: &Span) {
    if span.is_disabled() {
        return;
    }
    tracing::warn!(parent: span, %failure, ?latency, "Request failed");
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            state,
            cancel_token,
        }
    }

    /// Routes plus CORS and request tracing.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(log_response)
                .on_failure(log_failure),
        )
    }

    /// Serve until the cancellation token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("Invalid listen address: {e}")))?;

        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "API listening");

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("API server shutting down");
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_locally_with_cors() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert!(config.enable_cors);
    }

    #[test]
    fn health_check_is_not_traced() {
        assert!(is_quiet("/api/v1/health"));
        assert!(!is_quiet("/api/v1/miner/status"));
    }
}
