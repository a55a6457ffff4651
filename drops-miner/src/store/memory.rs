use std::collections::VecDeque;

use parking_lot::RwLock;

use super::{GameMap, LOG_RETENTION, Store, StoreResult};
use crate::domain::{AuthRecord, DropRecord, LogEvent, Settings, StatusSnapshot};

#[derive(Default)]
struct Tables {
    auth: Option<AuthRecord>,
    settings: Settings,
    games: GameMap,
    drops: Vec<DropRecord>,
    logs: VecDeque<LogEvent>,
    status: Option<StatusSnapshot>,
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get_auth(&self) -> StoreResult<Option<AuthRecord>> {
        Ok(self.tables.read().auth.clone())
    }

    fn save_auth(&self, record: &AuthRecord) -> StoreResult<()> {
        self.tables.write().auth = Some(record.clone());
        Ok(())
    }

    fn clear_auth(&self) -> StoreResult<()> {
        self.tables.write().auth = None;
        Ok(())
    }

    fn get_settings(&self) -> StoreResult<Settings> {
        Ok(self.tables.read().settings.clone())
    }

    fn save_settings(&self, settings: &Settings) -> StoreResult<()> {
        self.tables.write().settings = settings.clone();
        Ok(())
    }

    fn get_games(&self) -> StoreResult<GameMap> {
        Ok(self.tables.read().games.clone())
    }

    fn save_games(&self, games: &GameMap) -> StoreResult<()> {
        self.tables.write().games = games.clone();
        Ok(())
    }

    fn get_drops(&self) -> StoreResult<Vec<DropRecord>> {
        Ok(self.tables.read().drops.clone())
    }

    fn save_drops(&self, drops: &[DropRecord]) -> StoreResult<()> {
        self.tables.write().drops = drops.to_vec();
        Ok(())
    }

    fn append_log(&self, event: &LogEvent) -> StoreResult<()> {
        let mut tables = self.tables.write();
        tables.logs.push_back(event.clone());
        while tables.logs.len() > LOG_RETENTION {
            tables.logs.pop_front();
        }
        Ok(())
    }

    fn get_logs(&self, limit: usize) -> StoreResult<Vec<LogEvent>> {
        let tables = self.tables.read();
        let skip = tables.logs.len().saturating_sub(limit);
        Ok(tables.logs.iter().skip(skip).cloned().collect())
    }

    fn get_status(&self) -> StoreResult<Option<StatusSnapshot>> {
        Ok(self.tables.read().status.clone())
    }

    fn save_status(&self, status: &StatusSnapshot) -> StoreResult<()> {
        self.tables.write().status = Some(status.clone());
        Ok(())
    }
}
