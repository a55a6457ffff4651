use thiserror::Error;

use crate::auth::DeviceAuthFailure;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Network or non-2xx failure on one of the OAuth endpoints.
    #[error("auth transport error: {0}")]
    AuthTransport(String),
    /// Terminal outcome of the device-code poll loop.
    #[error("device authorization failed: {reason}")]
    DeviceAuthFailed { reason: DeviceAuthFailure },
    #[error("not authenticated")]
    NotAuthenticated,
    /// The OAuth validate endpoint refused the access token.
    #[error("access token rejected")]
    TokenRejected,
    #[error("unknown graphql operation: {0}")]
    UnknownOperation(String),
    #[error("graphql request failed with status {status}")]
    GraphQlTransport { status: u16 },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    pub fn device_auth_failed(reason: DeviceAuthFailure) -> Self {
        Self::DeviceAuthFailed { reason }
    }

    /// Whether a retry later has a chance of succeeding. A rejected token
    /// never recovers on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::GraphQlTransport { status } => *status != 401,
            Self::Http(_) | Self::InvalidResponse(_) => true,
            _ => false,
        }
    }

    /// Whether the credentials are missing or no longer accepted.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::TokenRejected | Self::GraphQlTransport { status: 401 }
        )
    }
}
