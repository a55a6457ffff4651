use std::time::Duration;

/// Endpoints and client identity used for every upstream call.
#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub client_id: String,
    pub user_agent: String,
    pub client_url: String,
    pub device_code_url: String,
    pub token_url: String,
    pub validate_url: String,
    pub gql_url: String,
    /// Applied to every request, auth endpoints included.
    pub request_timeout: Duration,
}

impl TwitchConfig {
    /// Android app client id, the one the device flow is registered for.
    pub const ANDROID_CLIENT_ID: &str = "kd1unb4b3q4t58fwlpcbzcbnm76a8fp";
    pub const ANDROID_USER_AGENT: &str = "Dalvik/2.1.0 (Linux; U; Android 7.1.2; SM-G977N Build/LMY48Z) tv.twitch.android.app/16.8.1/1608010";
    pub const CLIENT_URL: &str = "https://www.twitch.tv";
    pub const DEVICE_CODE_URL: &str = "https://id.twitch.tv/oauth2/device";
    pub const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
    pub const VALIDATE_URL: &str = "https://id.twitch.tv/oauth2/validate";
    pub const GQL_URL: &str = "https://gql.twitch.tv/gql";

    /// Point every endpoint at `base` (e.g. a local mock server).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.device_code_url = format!("{base}/oauth2/device");
        self.token_url = format!("{base}/oauth2/token");
        self.validate_url = format!("{base}/oauth2/validate");
        self.gql_url = format!("{base}/gql");
        self
    }
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            client_id: Self::ANDROID_CLIENT_ID.to_string(),
            user_agent: Self::ANDROID_USER_AGENT.to_string(),
            client_url: Self::CLIENT_URL.to_string(),
            device_code_url: Self::DEVICE_CODE_URL.to_string(),
            token_url: Self::TOKEN_URL.to_string(),
            validate_url: Self::VALIDATE_URL.to_string(),
            gql_url: Self::GQL_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}
