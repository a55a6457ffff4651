//! Application-wide error types.

use thiserror::Error;

use crate::store::StoreError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Platform error: {0}")]
    Platform(#[from] twitch_gql::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// The platform no longer accepts our credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Platform(e) if e.is_unauthorized())
    }

    /// A platform failure worth retrying after a cooldown.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Platform(e) if e.is_transient())
    }
}
