use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use twitch_gql::StreamNode;

/// A game on the watch list.
///
/// `name` is the directory slug used for stream discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub name: String,
    pub display_name: String,
    #[serde(rename = "boxArtURL", default)]
    pub box_art_url: String,
}

impl Game {
    /// Build a game from a display name, deriving id and slug from it.
    pub fn from_display_name(display_name: &str) -> Self {
        let slug = slugify(display_name);
        Self {
            id: slug.clone(),
            name: slug,
            display_name: display_name.trim().to_string(),
            box_art_url: String::new(),
        }
    }
}

/// Lowercase, spaces to dashes, apostrophes dropped.
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// The live broadcast currently being watched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamHandle {
    pub id: String,
    pub user_login: String,
    pub user_name: String,
    pub title: String,
    pub viewer_count: u64,
    pub language: String,
    pub game_id: String,
}

impl StreamHandle {
    pub fn from_node(node: StreamNode, game_id: &str) -> Self {
        Self {
            id: node.id,
            user_login: node.user_login,
            user_name: node.user_name,
            title: node.title,
            viewer_count: node.viewer_count,
            language: node.language,
            game_id: game_id.to_string(),
        }
    }
}

/// A time-based reward and the progress made toward it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    pub required_minutes: u32,
    #[serde(default)]
    pub current_minutes: u32,
    pub game_id: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub is_claimed: bool,
    #[serde(default)]
    pub is_completed: bool,
}

impl DropRecord {
    pub fn set_progress(&mut self, minutes: u32) {
        self.current_minutes = minutes;
        self.is_completed = minutes >= self.required_minutes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_names() {
        assert_eq!(slugify("Rust"), "rust");
        assert_eq!(slugify("  Tom Clancy's  Rainbow Six Siege "), "tom-clancys-rainbow-six-siege");
        assert_eq!(slugify("Assassin’s Creed"), "assassins-creed");
    }

    #[test]
    fn game_from_display_name() {
        let game = Game::from_display_name("Escape from Tarkov");
        assert_eq!(game.id, "escape-from-tarkov");
        assert_eq!(game.name, "escape-from-tarkov");
        assert_eq!(game.display_name, "Escape from Tarkov");
    }

    #[test]
    fn game_serializes_box_art_key() {
        let game = Game::from_display_name("Rust");
        let value = serde_json::to_value(&game).unwrap();
        assert_eq!(value["displayName"], "Rust");
        assert!(value.get("boxArtURL").is_some());
    }

    #[test]
    fn drop_progress_completes_at_requirement() {
        let mut record = DropRecord {
            id: "d1".into(),
            name: "Crate".into(),
            description: String::new(),
            image_url: String::new(),
            start_at: None,
            end_at: None,
            required_minutes: 60,
            current_minutes: 0,
            game_id: "rust".into(),
            game_name: "Rust".into(),
            is_claimed: false,
            is_completed: false,
        };
        record.set_progress(59);
        assert!(!record.is_completed);
        record.set_progress(60);
        assert!(record.is_completed);
    }
}
