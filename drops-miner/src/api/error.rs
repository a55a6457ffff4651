//! Error bodies returned by the HTTP API.
//!
//! Every failure leaves as `{"code", "message"}` with a status derived from
//! the crate error that caused it.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::Error;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// A Twitch call failed or answered with something unusable.
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<twitch_gql::Error> for ApiError {
    fn from(err: twitch_gql::Error) -> Self {
        use twitch_gql::Error as Platform;
        match err {
            e if e.is_unauthorized() => ApiError::unauthorized(e.to_string()),
            Platform::DeviceAuthFailed { reason } => ApiError::new(
                StatusCode::CONFLICT,
                "DEVICE_AUTH_FAILED",
                format!("Device authorization failed: {reason}"),
            ),
            Platform::UnknownOperation(name) => {
                error!(operation = %name, "Request for unregistered GraphQL operation");
                ApiError::internal("Unsupported platform operation")
            }
            other => {
                warn!(error = %other, "Upstream call failed");
                ApiError::bad_gateway(other.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!(error = %err, "Store access failed");
        ApiError::internal("Storage error occurred")
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Platform(e) => e.into(),
            Error::Store(e) => e.into(),
            Error::NotFound { entity_type, id } => {
                ApiError::not_found(format!("{entity_type} '{id}' not found"))
            }
            Error::Validation(msg) => ApiError::validation(msg),
            Error::Configuration(msg) => ApiError::bad_request(msg),
            other => {
                error!(error = %other, "Request failed");
                ApiError::internal("An unexpected error occurred")
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entity_is_404() {
        let api_err: ApiError = Error::not_found("Drop", "abc").into();
        assert_eq!(api_err.status, StatusCode::NOT_FOUND);
        assert!(api_err.message.contains("abc"));
    }

    #[test]
    fn platform_errors_map_by_kind() {
        let api_err: ApiError = Error::Platform(twitch_gql::Error::NotAuthenticated).into();
        assert_eq!(api_err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(api_err.code, "NOT_AUTHENTICATED");

        let api_err: ApiError = twitch_gql::Error::GraphQlTransport { status: 401 }.into();
        assert_eq!(api_err.status, StatusCode::UNAUTHORIZED);

        let api_err: ApiError = twitch_gql::Error::GraphQlTransport { status: 503 }.into();
        assert_eq!(api_err.status, StatusCode::BAD_GATEWAY);

        let api_err: ApiError = twitch_gql::Error::DeviceAuthFailed {
            reason: twitch_gql::DeviceAuthFailure::Denied,
        }
        .into();
        assert_eq!(api_err.status, StatusCode::CONFLICT);

        let api_err: ApiError = twitch_gql::Error::UnknownOperation("Nope".into()).into();
        assert_eq!(api_err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_settings_are_422() {
        let api_err: ApiError = Error::validation("watchInterval must be at least 1 second").into();
        assert_eq!(api_err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api_err.code, "VALIDATION_ERROR");
    }
}
