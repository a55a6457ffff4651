use serde::{Deserialize, Serialize};

/// Device-code issuance response, kept verbatim from upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCode {
    pub verification_uri: String,
    pub user_code: String,
    pub device_code: String,
    /// Seconds until the device code expires.
    pub expires_in: u64,
    /// Minimum seconds between token polls.
    #[serde(rename = "interval")]
    pub poll_interval: u64,
}

/// Successful token-poll payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// OAuth error payload returned with HTTP 400.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// What the validate endpoint reports about an access token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenValidation {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub login: String,
    pub user_id: String,
    /// Remaining lifetime in seconds. Zero or absent for non-expiring tokens.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// A live broadcast as listed in a game directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamNode {
    pub id: String,
    pub user_login: String,
    pub user_name: String,
    pub title: String,
    pub viewer_count: u64,
    pub language: String,
}
