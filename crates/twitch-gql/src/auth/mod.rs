//! OAuth device-code login.
//!
//! [`device`] holds the two raw HTTP calls, [`schedule`] the retry/backoff
//! rules, and [`AuthController`] drives them as a cancellable background poll.

mod controller;
pub mod device;
pub mod schedule;

pub use controller::AuthController;
pub use schedule::{DeviceAuthFailure, PollStatus};

/// Credentials returned by a successful token poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, when upstream reports one.
    pub expires_in: Option<u64>,
    /// Filled in once the token has been validated.
    pub user_id: Option<String>,
}
