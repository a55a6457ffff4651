//! Process configuration from flags, environment and `.env`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use twitch_gql::TwitchConfig;

use crate::api::ApiServerConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "drops-miner", version, about = "Unattended Twitch drops miner")]
pub struct AppConfig {
    /// Directory holding the JSON store
    #[arg(long, env = "DROPS_MINER_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for rolling log files
    #[arg(long, env = "DROPS_MINER_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    #[arg(long, env = "API_BIND_ADDRESS", default_value = "127.0.0.1")]
    pub bind_address: String,

    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Start mining right away when a saved login is restored
    #[arg(long, env = "DROPS_MINER_AUTOSTART")]
    pub autostart: bool,

    #[arg(long, env = "TWITCH_CLIENT_ID", default_value = TwitchConfig::ANDROID_CLIENT_ID)]
    pub client_id: String,

    #[arg(long, env = "TWITCH_USER_AGENT")]
    pub user_agent: Option<String>,

    #[arg(long, env = "TWITCH_DEVICE_CODE_URL")]
    pub device_code_url: Option<String>,

    #[arg(long, env = "TWITCH_TOKEN_URL")]
    pub token_url: Option<String>,

    #[arg(long, env = "TWITCH_VALIDATE_URL")]
    pub validate_url: Option<String>,

    #[arg(long, env = "TWITCH_GQL_URL")]
    pub gql_url: Option<String>,

    /// Timeout for every upstream request, in seconds
    #[arg(long, env = "TWITCH_REQUEST_TIMEOUT", default_value_t = 10)]
    pub request_timeout: u64,
}

impl AppConfig {
    /// Parse flags after loading `.env` into the environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    pub fn twitch_config(&self) -> TwitchConfig {
        let mut config = TwitchConfig {
            client_id: self.client_id.clone(),
            request_timeout: Duration::from_secs(self.request_timeout.max(1)),
            ..TwitchConfig::default()
        };
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(url) = &self.device_code_url {
            config.device_code_url = url.clone();
        }
        if let Some(url) = &self.token_url {
            config.token_url = url.clone();
        }
        if let Some(url) = &self.validate_url {
            config.validate_url = url.clone();
        }
        if let Some(url) = &self.gql_url {
            config.gql_url = url.clone();
        }
        config
    }

    pub fn api_config(&self) -> ApiServerConfig {
        ApiServerConfig {
            bind_address: self.bind_address.clone(),
            port: self.port,
            ..ApiServerConfig::default()
        }
    }
}
