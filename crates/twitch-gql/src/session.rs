//! Shared credential state.
//!
//! The session is either fully authenticated or logged out; readers always get
//! a consistent copy of one of the two.

use parking_lot::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    LoggedOut,
    Authenticated {
        access_token: String,
        user_id: Option<String>,
    },
}

#[derive(Debug)]
pub struct AuthSession {
    state: RwLock<AuthState>,
    device_id: String,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::with_device_id(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn with_device_id(device_id: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(AuthState::LoggedOut),
            device_id: device_id.into(),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(*self.state.read(), AuthState::Authenticated { .. })
    }

    pub fn access_token(&self) -> Option<String> {
        match &*self.state.read() {
            AuthState::Authenticated { access_token, .. } => Some(access_token.clone()),
            AuthState::LoggedOut => None,
        }
    }

    pub fn user_id(&self) -> Option<String> {
        match &*self.state.read() {
            AuthState::Authenticated { user_id, .. } => user_id.clone(),
            AuthState::LoggedOut => None,
        }
    }

    /// Sent as `X-Device-Id` on GraphQL calls.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn authenticate(&self, access_token: impl Into<String>, user_id: Option<String>) {
        *self.state.write() = AuthState::Authenticated {
            access_token: access_token.into(),
            user_id,
        };
    }

    pub fn clear(&self) {
        *self.state.write() = AuthState::LoggedOut;
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_starts_logged_out() {
        let session = AuthSession::new();
        assert!(!session.is_logged_in());
        assert_eq!(session.access_token(), None);
        assert_eq!(session.device_id().len(), 32);
    }

    #[test]
    fn authenticate_and_clear() {
        let session = AuthSession::with_device_id("dev");
        session.authenticate("tok", Some("42".to_string()));
        assert!(session.is_logged_in());
        assert_eq!(session.access_token().as_deref(), Some("tok"));
        assert_eq!(session.user_id().as_deref(), Some("42"));

        session.clear();
        assert_eq!(session.state(), AuthState::LoggedOut);
        assert_eq!(session.user_id(), None);
        assert_eq!(session.device_id(), "dev");
    }
}
