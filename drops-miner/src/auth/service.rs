use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use twitch_gql::{AuthController, AuthSession, DeviceAuthFailure, DeviceCode, PollStatus};

use crate::domain::{AuthRecord, LogLevel};
use crate::error::Result;
use crate::journal::Journal;
use crate::store::Store;

/// Login state as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    pub poll: PollStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct LoginService {
    controller: Arc<AuthController>,
    store: Arc<dyn Store>,
    journal: Journal,
}

impl LoginService {
    pub fn new(controller: Arc<AuthController>, store: Arc<dyn Store>, journal: Journal) -> Self {
        Self {
            controller,
            store,
            journal,
        }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        self.controller.session()
    }

    /// Logged in with a token whose stored lifetime has not run out.
    pub fn is_authenticated(&self) -> bool {
        if !self.session().is_logged_in() {
            return false;
        }
        !matches!(
            self.store.get_auth(),
            Ok(Some(record)) if !record.is_valid_at(Utc::now())
        )
    }

    /// Load a persisted token into the session if it has not expired and
    /// upstream still accepts it. When the validate endpoint cannot be
    /// reached the stored record is used as saved.
    pub async fn restore(&self) -> Result<bool> {
        let Some(mut record) = self.store.get_auth()? else {
            return Ok(false);
        };
        let now = Utc::now();
        if !record.is_valid_at(now) {
            info!(expired_at = %record.expires_at, "Discarding expired login");
            self.store.clear_auth()?;
            return Ok(false);
        }

        match self.controller.validate(&record.access_token).await {
            Ok(validation) => {
                record.apply_validation(validation.user_id, validation.expires_in, now);
                self.store.save_auth(&record)?;
            }
            Err(e) if e.is_unauthorized() => {
                info!("Stored login was rejected upstream");
                self.store.clear_auth()?;
                self.journal
                    .log(LogLevel::Warning, "Saved login is no longer valid; log in again");
                return Ok(false);
            }
            Err(e) => warn!(error = %e, "Could not validate stored login; using it as saved"),
        }

        self.session()
            .authenticate(record.access_token, record.user_id);
        info!(expires_at = %record.expires_at, "Restored previous login");
        Ok(true)
    }

    pub async fn begin(&self) -> Result<DeviceCode> {
        let code = self.controller.begin_device_auth().await?;
        self.journal.log(
            LogLevel::Info,
            format!(
                "Visit {} and enter code {}",
                code.verification_uri, code.user_code
            ),
        );
        Ok(code)
    }

    /// Start polling in the background. A poll already in flight is
    /// superseded.
    pub fn start_polling(&self, device_code: String, interval: u64, expires_in: Option<u64>) {
        let poll = self
            .controller
            .start_polling(device_code, interval, expires_in);
        let store = Arc::clone(&self.store);
        let journal = self.journal.clone();

        // A superseded poll resolves to Cancelled, so its watcher exits on its own.
        tokio::spawn(async move {
            match poll.await {
                Ok(Ok(grant)) => {
                    let record = AuthRecord::from_grant(grant, Utc::now());
                    if let Err(e) = store.save_auth(&record) {
                        journal.log(LogLevel::Warning, format!("Logged in, but saving the token failed: {e}"));
                    } else {
                        journal.log(LogLevel::Success, "Logged in to Twitch");
                    }
                }
                Ok(Err(twitch_gql::Error::DeviceAuthFailed {
                    reason: DeviceAuthFailure::Cancelled,
                })) => {
                    debug!("Login polling cancelled");
                }
                Ok(Err(e)) => journal.log(LogLevel::Error, format!("Login failed: {e}")),
                Err(e) => journal.log(LogLevel::Error, format!("Login task failed: {e}")),
            }
        });
    }

    pub fn cancel(&self) -> bool {
        let cancelled = self.controller.cancel();
        if cancelled {
            self.journal.log(LogLevel::Info, "Login cancelled");
        }
        cancelled
    }

    pub fn status(&self) -> AuthStatus {
        let expires_at = self
            .store
            .get_auth()
            .ok()
            .flatten()
            .map(|record| record.expires_at);
        let authenticated = self.is_authenticated();
        let poll = match self.controller.status() {
            PollStatus::Authenticated if !authenticated => PollStatus::Idle,
            other => other,
        };
        AuthStatus {
            authenticated,
            poll,
            expires_at,
        }
    }

    pub fn logout(&self) -> Result<()> {
        self.controller.reset();
        self.session().clear();
        self.store.clear_auth()?;
        self.journal.log(LogLevel::Info, "Logged out");
        Ok(())
    }
}
