//! Outbound HTTP for everything Twitch.
//!
//! One pooled [`reqwest::Client`] is built on first use and shared for the
//! process lifetime. Authenticated calls pick the token up from the shared
//! [`AuthSession`] at send time.

use std::sync::{Arc, OnceLock};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::TwitchConfig;
use crate::error::{Error, Result};
use crate::operations::GqlOperation;
use crate::session::AuthSession;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

fn build_http_client(config: &TwitchConfig) -> Client {
    install_rustls_provider();

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(16)
        .build()
        .unwrap_or_else(|error| {
            warn!(error = %error, "Failed to build configured HTTP client; using reqwest defaults");
            Client::new()
        })
}

pub struct TransportClient {
    config: TwitchConfig,
    session: Arc<AuthSession>,
    http: OnceLock<Client>,
}

impl TransportClient {
    pub fn new(config: TwitchConfig, session: Arc<AuthSession>) -> Self {
        Self {
            config,
            session,
            http: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &TwitchConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    fn http(&self) -> &Client {
        self.http.get_or_init(|| build_http_client(&self.config))
    }

    /// Build a request, adding `Authorization` when the session holds a token.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http().request(method, url);
        match self.session.access_token() {
            Some(token) => builder.header(AUTHORIZATION, format!("OAuth {token}")),
            None => builder,
        }
    }

    /// Build a request that never carries credentials (OAuth endpoints).
    pub fn unauthenticated(&self, method: Method, url: &str) -> RequestBuilder {
        self.http()
            .request(method, url)
            .header("Client-Id", &self.config.client_id)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::ORIGIN, &self.config.client_url)
            .header(reqwest::header::REFERER, &self.config.client_url)
    }

    /// Send one or more persisted-query operations.
    ///
    /// A single operation goes out as a JSON object, several as one batched
    /// array. The result always has one entry per upstream response object.
    pub async fn graphql_request(&self, operations: &[GqlOperation]) -> Result<Vec<Value>> {
        let token = self.session.access_token().ok_or(Error::NotAuthenticated)?;
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let body = match operations {
            [single] => serde_json::to_string(single)?,
            many => serde_json::to_string(many)?,
        };

        let names: Vec<&str> = operations.iter().map(|o| o.operation_name.as_str()).collect();
        debug!(operations = ?names, "Sending GraphQL request");

        let mut request = self
            .http()
            .post(&self.config.gql_url)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain;charset=UTF-8"))
            .header("Client-ID", &self.config.client_id)
            .header(AUTHORIZATION, format!("OAuth {token}"));
        let device_id = self.session.device_id();
        if !device_id.is_empty() {
            request = request.header("X-Device-Id", device_id);
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("GraphQL rejected the access token; logging out");
            self.session.clear();
        }
        if status != StatusCode::OK {
            return Err(Error::GraphQlTransport {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        trace!(body = %text, "GraphQL response");
        parse_gql_body(&text)
    }

    /// Send a single operation and return its response object.
    pub async fn graphql_one(&self, operation: GqlOperation) -> Result<Value> {
        let mut responses = self.graphql_request(std::slice::from_ref(&operation)).await?;
        if responses.is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(responses.swap_remove(0))
    }
}

/// Parse as an array first, then as a single object.
fn parse_gql_body(body: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => Ok(items),
        single @ Value::Object(_) => Ok(vec![single]),
        other => Err(Error::InvalidResponse(format!(
            "unexpected GraphQL payload: {other}"
        ))),
    }
}
