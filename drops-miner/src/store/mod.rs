//! Persistent key/value storage for auth, settings, games, drops, logs and status.
//!
//! The [`Store`] trait is plain synchronous CRUD. Compound operations that
//! touch more than one entity (e.g. adding a game also appends it to the
//! priority list) are provided methods and carry no transactional guarantee.

mod json;
mod memory;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::{AuthRecord, DropRecord, Game, LogEvent, Settings, StatusSnapshot};

pub use json::JsonFileStore;
pub use memory::MemoryStore;

/// Number of log entries kept; older ones are evicted first.
pub const LOG_RETENTION: usize = 1000;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error while {op} ({}): {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type GameMap = BTreeMap<String, Game>;

pub trait Store: Send + Sync {
    fn get_auth(&self) -> StoreResult<Option<AuthRecord>>;
    fn save_auth(&self, record: &AuthRecord) -> StoreResult<()>;
    fn clear_auth(&self) -> StoreResult<()>;

    fn get_settings(&self) -> StoreResult<Settings>;
    fn save_settings(&self, settings: &Settings) -> StoreResult<()>;

    fn get_games(&self) -> StoreResult<GameMap>;
    fn save_games(&self, games: &GameMap) -> StoreResult<()>;

    fn get_drops(&self) -> StoreResult<Vec<DropRecord>>;
    fn save_drops(&self, drops: &[DropRecord]) -> StoreResult<()>;

    /// Append one entry, evicting the oldest beyond [`LOG_RETENTION`].
    fn append_log(&self, event: &LogEvent) -> StoreResult<()>;
    /// Newest `limit` entries, oldest first.
    fn get_logs(&self, limit: usize) -> StoreResult<Vec<LogEvent>>;

    fn get_status(&self) -> StoreResult<Option<StatusSnapshot>>;
    fn save_status(&self, status: &StatusSnapshot) -> StoreResult<()>;

    fn get_game(&self, id: &str) -> StoreResult<Option<Game>> {
        Ok(self.get_games()?.remove(id))
    }

    /// Insert or replace a game and append it to the priority list.
    fn add_game(&self, game: Game) -> StoreResult<()> {
        let id = game.id.clone();
        let mut games = self.get_games()?;
        games.insert(id.clone(), game);
        self.save_games(&games)?;

        let mut settings = self.get_settings()?;
        if !settings.games.contains(&id) {
            settings.games.push(id);
            self.save_settings(&settings)?;
        }
        Ok(())
    }

    /// Remove a game from the catalog and the priority list. Returns whether
    /// it existed in either.
    fn remove_game(&self, id: &str) -> StoreResult<bool> {
        let mut games = self.get_games()?;
        let in_catalog = games.remove(id).is_some();
        if in_catalog {
            self.save_games(&games)?;
        }

        let mut settings = self.get_settings()?;
        let before = settings.games.len();
        settings.games.retain(|g| g != id);
        let in_list = settings.games.len() != before;
        if in_list {
            self.save_settings(&settings)?;
        }
        Ok(in_catalog || in_list)
    }

    fn reorder_games(&self, game_ids: Vec<String>) -> StoreResult<()> {
        let mut settings = self.get_settings()?;
        settings.games = game_ids;
        self.save_settings(&settings)
    }

    /// Known games in priority order. Ids on the list without a catalog
    /// entry are skipped.
    fn ordered_games(&self) -> StoreResult<Vec<Game>> {
        let settings = self.get_settings()?;
        let mut games = self.get_games()?;
        Ok(settings
            .games
            .iter()
            .filter_map(|id| games.remove(id))
            .collect())
    }

    /// Set progress on a drop. Returns `false` if the drop is unknown.
    fn update_drop_progress(&self, id: &str, minutes: u32) -> StoreResult<Option<DropRecord>> {
        let mut drops = self.get_drops()?;
        let Some(record) = drops.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        record.set_progress(minutes);
        let updated = record.clone();
        self.save_drops(&drops)?;
        Ok(Some(updated))
    }

    fn mark_drop_claimed(&self, id: &str) -> StoreResult<Option<DropRecord>> {
        let mut drops = self.get_drops()?;
        let Some(record) = drops.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        record.is_claimed = true;
        let claimed = record.clone();
        self.save_drops(&drops)?;
        Ok(Some(claimed))
    }
}

#[cfg(test)]
pub(crate) fn sample_drop(id: &str, required_minutes: u32) -> DropRecord {
    DropRecord {
        id: id.to_string(),
        name: format!("Drop {id}"),
        description: String::new(),
        image_url: String::new(),
        start_at: None,
        end_at: None,
        required_minutes,
        current_minutes: 0,
        game_id: "rust".to_string(),
        game_name: "Rust".to_string(),
        is_claimed: false,
        is_completed: false,
    }
}
