use reqwest::{Method, StatusCode};
use tracing::debug;

use super::TokenGrant;
use crate::client::TransportClient;
use crate::error::{Error, Result};
use crate::models::{DeviceCode, TokenErrorResponse, TokenResponse, TokenValidation};

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// What a single token-poll attempt told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Granted(TokenGrant),
    Pending,
    SlowDown,
    Expired,
    Denied,
    /// Network failure, unexpected status or unreadable body.
    Transient(String),
}

impl PollOutcome {
    fn from_error_code(code: &str) -> Self {
        match code {
            "authorization_pending" => Self::Pending,
            "slow_down" => Self::SlowDown,
            "expired_token" => Self::Expired,
            "access_denied" => Self::Denied,
            other => Self::Transient(format!("unrecognised oauth error: {other}")),
        }
    }
}

/// Ask for a device code. No credentials are sent.
pub async fn request_device_code(transport: &TransportClient) -> Result<DeviceCode> {
    let config = transport.config();
    let form = [("client_id", config.client_id.as_str()), ("scopes", "")];

    let response = transport
        .unauthenticated(Method::POST, &config.device_code_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::AuthTransport(format!("device code request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::AuthTransport(format!(
            "device code request failed with status {status}"
        )));
    }

    response
        .json::<DeviceCode>()
        .await
        .map_err(|e| Error::AuthTransport(format!("invalid device code response: {e}")))
}

/// Run one poll against the token endpoint. Never fails; every problem is
/// folded into [`PollOutcome::Transient`].
pub async fn poll_token_once(transport: &TransportClient, device_code: &str) -> PollOutcome {
    let config = transport.config();
    let form = [
        ("client_id", config.client_id.as_str()),
        ("device_code", device_code),
        ("grant_type", DEVICE_GRANT_TYPE),
    ];

    let response = match transport
        .unauthenticated(Method::POST, &config.token_url)
        .form(&form)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return PollOutcome::Transient(format!("token poll failed: {e}")),
    };

    match response.status() {
        StatusCode::OK => match response.json::<TokenResponse>().await {
            Ok(token) => PollOutcome::Granted(TokenGrant {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_in: token.expires_in,
                user_id: None,
            }),
            Err(e) => PollOutcome::Transient(format!("unreadable token response: {e}")),
        },
        StatusCode::BAD_REQUEST => match response.json::<TokenErrorResponse>().await {
            Ok(body) => {
                // Twitch reports the code in `message`; RFC 8628 uses `error`.
                let code = if body.error.is_empty() {
                    body.message.unwrap_or_default()
                } else {
                    body.error
                };
                debug!(code = %code, "Token poll returned oauth error");
                PollOutcome::from_error_code(&code)
            }
            Err(e) => PollOutcome::Transient(format!("unreadable error response: {e}")),
        },
        other => PollOutcome::Transient(format!("unexpected status {other}")),
    }
}

/// Ask the validate endpoint who owns `access_token` and how long it lives.
pub async fn validate_token(
    transport: &TransportClient,
    access_token: &str,
) -> Result<TokenValidation> {
    let config = transport.config();
    let response = transport
        .unauthenticated(Method::GET, &config.validate_url)
        .header(reqwest::header::AUTHORIZATION, format!("OAuth {access_token}"))
        .send()
        .await
        .map_err(|e| Error::AuthTransport(format!("token validation failed: {e}")))?;

    match response.status() {
        StatusCode::UNAUTHORIZED => Err(Error::TokenRejected),
        status if !status.is_success() => Err(Error::AuthTransport(format!(
            "token validation failed with status {status}"
        ))),
        _ => response
            .json::<TokenValidation>()
            .await
            .map_err(|e| Error::AuthTransport(format!("invalid validation response: {e}"))),
    }
}
