use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use twitch_gql::TokenGrant;

use crate::error::{Error, Result};

/// Lifetime assumed when upstream does not report one.
pub const AUTH_RECORD_TTL_HOURS: i64 = 4;

/// Longest lifetime accepted from upstream.
const MAX_TOKEN_LIFETIME_SECS: u64 = 60 * 60 * 24 * 365;

/// User-editable settings, including the watch-list priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Game ids in priority order.
    pub games: Vec<String>,
    /// Seconds between watch-time requests.
    pub watch_interval: u64,
    pub auto_claim_drops: bool,
    pub notifications_enabled: bool,
    pub theme: String,
    pub language: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            games: Vec::new(),
            watch_interval: 20,
            auto_claim_drops: true,
            notifications_enabled: true,
            theme: "dark".to_string(),
            language: "en".to_string(),
            updated_at: None,
        }
    }
}

impl Settings {
    /// Reject values the miner cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.watch_interval == 0 {
            return Err(Error::validation("watchInterval must be at least 1 second"));
        }
        Ok(())
    }
}

/// Persisted credentials from the last successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRecord {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuthRecord {
    pub fn new(access_token: String, refresh_token: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            access_token,
            refresh_token,
            user_id: None,
            expires_at: now + Duration::hours(AUTH_RECORD_TTL_HOURS),
            updated_at: now,
        }
    }

    /// Record for a fresh grant, using the lifetime upstream reported.
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let mut record = Self::new(grant.access_token, grant.refresh_token, now);
        record.user_id = grant.user_id;
        record.apply_lifetime(grant.expires_in, now);
        record
    }

    /// Fold in what the validate endpoint reported.
    pub fn apply_validation(&mut self, user_id: String, expires_in: Option<u64>, now: DateTime<Utc>) {
        self.user_id = Some(user_id);
        self.apply_lifetime(expires_in, now);
        self.updated_at = now;
    }

    fn apply_lifetime(&mut self, expires_in: Option<u64>, now: DateTime<Utc>) {
        if let Some(secs) = expires_in.filter(|secs| *secs > 0) {
            let secs = secs.min(MAX_TOKEN_LIFETIME_SECS) as i64;
            self.expires_at = now + Duration::seconds(secs);
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && now < self.expires_at
    }
}
