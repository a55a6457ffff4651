use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Game, StreamHandle};

/// Point-in-time public state of the miner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub current_game: Option<Game>,
    pub current_stream: Option<StreamHandle>,
    /// Seconds on the current stream.
    pub watch_duration: u64,
    /// Seconds watched during this run, current stream included.
    pub total_watched: u64,
    pub games_queue: Vec<Game>,
    pub last_update: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn idle(games_queue: Vec<Game>) -> Self {
        Self {
            is_running: false,
            current_game: None,
            current_stream: None,
            watch_duration: 0,
            total_watched: 0,
            games_queue,
            last_update: Utc::now(),
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::idle(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

/// A notable occurrence, persisted and pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(default)]
    pub stream_id: Option<String>,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            game_id: None,
            stream_id: None,
        }
    }

    pub fn with_game(mut self, game_id: impl Into<String>) -> Self {
        self.game_id = Some(game_id.into());
        self
    }

    pub fn with_stream(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Game;

    #[test]
    fn snapshot_survives_json() {
        let game = Game::from_display_name("Rust");
        let snapshot = StatusSnapshot {
            is_running: true,
            current_game: Some(game.clone()),
            current_stream: Some(StreamHandle {
                id: "1".into(),
                user_login: "streamer".into(),
                user_name: "Streamer".into(),
                title: "drops on".into(),
                viewer_count: 1200,
                language: "en".into(),
                game_id: game.id.clone(),
            }),
            watch_duration: 40,
            total_watched: 640,
            games_queue: vec![game],
            last_update: Utc::now(),
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"isRunning\":true"));
        assert!(json.contains("\"viewerCount\":1200"));
        let parsed: StatusSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn log_levels_are_uppercase() {
        let event = LogEvent::new(LogLevel::Success, "watching").with_game("rust");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["level"], "SUCCESS");
        assert_eq!(value["gameId"], "rust");
        assert!(value["streamId"].is_null());
    }
}
