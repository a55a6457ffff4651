use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{GameMap, LOG_RETENTION, Store, StoreError, StoreResult};
use crate::domain::{AuthRecord, DropRecord, LogEvent, Settings, StatusSnapshot};

const AUTH_FILE: &str = "auth.json";
const SETTINGS_FILE: &str = "settings.json";
const GAMES_FILE: &str = "games.json";
const DROPS_FILE: &str = "drops.json";
/// One event per line, appended in place.
const LOGS_FILE: &str = "logs.jsonl";
const STATUS_FILE: &str = "status.json";

/// One JSON document per entity under a data directory.
///
/// Writes go to a sibling temp file first and are renamed into place. The
/// log is the exception: events are appended as single lines, reads are
/// served from an in-memory tail, and the file is compacted once it holds
/// twice the retention.
pub struct JsonFileStore {
    dir: PathBuf,
    io_lock: Mutex<()>,
    /// Loaded on first use.
    logs: Mutex<Option<LogTail>>,
}

struct LogTail {
    entries: VecDeque<LogEvent>,
    lines_on_disk: usize,
}

impl JsonFileStore {
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io("creating data directory", &dir, e))?;
        debug!(path = %dir.display(), "Opened JSON store");
        Ok(Self {
            dir,
            io_lock: Mutex::new(()),
            logs: Mutex::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> StoreResult<Option<T>> {
        let path = self.path(file);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io("reading", &path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    fn write<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> StoreResult<()> {
        let path = self.path(file);
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| StoreError::io("writing", &tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io("replacing", &path, e))
    }

    fn load_log_tail(&self) -> StoreResult<LogTail> {
        let path = self.path(LOGS_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(StoreError::io("reading", &path, e)),
        };

        let mut tail = LogTail {
            entries: VecDeque::with_capacity(LOG_RETENTION),
            lines_on_disk: 0,
        };
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            tail.lines_on_disk += 1;
            match serde_json::from_str::<LogEvent>(line) {
                Ok(event) => {
                    tail.entries.push_back(event);
                    if tail.entries.len() > LOG_RETENTION {
                        tail.entries.pop_front();
                    }
                }
                // a crash mid-append leaves a torn last line
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable log line"),
            }
        }
        if !text.is_empty() && !text.ends_with('\n') {
            self.compact_logs(&mut tail)?;
        }
        Ok(tail)
    }

    fn encode_log_line(&self, event: &LogEvent) -> StoreResult<Vec<u8>> {
        let mut line = serde_json::to_vec(event).map_err(|source| StoreError::Json {
            path: self.path(LOGS_FILE),
            source,
        })?;
        line.push(b'\n');
        Ok(line)
    }

    /// Rewrite the log file with only the retained tail.
    fn compact_logs(&self, tail: &mut LogTail) -> StoreResult<()> {
        let path = self.path(LOGS_FILE);
        let mut bytes = Vec::new();
        for event in &tail.entries {
            bytes.extend(self.encode_log_line(event)?);
        }
        let tmp = path.with_extension("jsonl.tmp");
        fs::write(&tmp, bytes).map_err(|e| StoreError::io("writing", &tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io("replacing", &path, e))?;
        tail.lines_on_disk = tail.entries.len();
        debug!(kept = tail.lines_on_disk, "Compacted log file");
        Ok(())
    }

    fn remove(&self, file: &str) -> StoreResult<()> {
        let path = self.path(file);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("removing", &path, e)),
        }
    }
}

impl Store for JsonFileStore {
    fn get_auth(&self) -> StoreResult<Option<AuthRecord>> {
        let _guard = self.io_lock.lock();
        self.read(AUTH_FILE)
    }

    fn save_auth(&self, record: &AuthRecord) -> StoreResult<()> {
        let _guard = self.io_lock.lock();
        self.write(AUTH_FILE, record)
    }

    fn clear_auth(&self) -> StoreResult<()> {
        let _guard = self.io_lock.lock();
        self.remove(AUTH_FILE)
    }

    fn get_settings(&self) -> StoreResult<Settings> {
        let _guard = self.io_lock.lock();
        Ok(self.read(SETTINGS_FILE)?.unwrap_or_default())
    }

    fn save_settings(&self, settings: &Settings) -> StoreResult<()> {
        let _guard = self.io_lock.lock();
        self.write(SETTINGS_FILE, settings)
    }

    fn get_games(&self) -> StoreResult<GameMap> {
        let _guard = self.io_lock.lock();
        Ok(self.read(GAMES_FILE)?.unwrap_or_default())
    }

    fn save_games(&self, games: &GameMap) -> StoreResult<()> {
        let _guard = self.io_lock.lock();
        self.write(GAMES_FILE, games)
    }

    fn get_drops(&self) -> StoreResult<Vec<DropRecord>> {
        let _guard = self.io_lock.lock();
        Ok(self.read(DROPS_FILE)?.unwrap_or_default())
    }

    fn save_drops(&self, drops: &[DropRecord]) -> StoreResult<()> {
        let _guard = self.io_lock.lock();
        self.write(DROPS_FILE, drops)
    }

    fn append_log(&self, event: &LogEvent) -> StoreResult<()> {
        let mut guard = self.logs.lock();
        if guard.is_none() {
            *guard = Some(self.load_log_tail()?);
        }
        let Some(tail) = guard.as_mut() else {
            return Ok(());
        };

        let path = self.path(LOGS_FILE);
        let line = self.encode_log_line(event)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(&line))
            .map_err(|e| StoreError::io("appending to", &path, e))?;

        tail.lines_on_disk += 1;
        tail.entries.push_back(event.clone());
        if tail.entries.len() > LOG_RETENTION {
            tail.entries.pop_front();
        }
        if tail.lines_on_disk > LOG_RETENTION * 2 {
            self.compact_logs(tail)?;
        }
        Ok(())
    }

    fn get_logs(&self, limit: usize) -> StoreResult<Vec<LogEvent>> {
        let mut guard = self.logs.lock();
        if guard.is_none() {
            *guard = Some(self.load_log_tail()?);
        }
        let Some(tail) = guard.as_ref() else {
            return Ok(Vec::new());
        };
        let skip = tail.entries.len().saturating_sub(limit);
        Ok(tail.entries.iter().skip(skip).cloned().collect())
    }

    fn get_status(&self) -> StoreResult<Option<StatusSnapshot>> {
        let _guard = self.io_lock.lock();
        self.read(STATUS_FILE)
    }

    fn save_status(&self, status: &StatusSnapshot) -> StoreResult<()> {
        let _guard = self.io_lock.lock();
        self.write(STATUS_FILE, status)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::domain::{Game, LogLevel};
    use crate::store::sample_drop;

    #[test]
    fn empty_directory_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        assert!(store.get_auth().unwrap().is_none());
        assert_eq!(store.get_settings().unwrap(), Settings::default());
        assert!(store.get_games().unwrap().is_empty());
        assert!(store.get_logs(10).unwrap().is_empty());
        assert!(store.get_status().unwrap().is_none());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store.add_game(Game::from_display_name("Rust")).unwrap();
            store.save_drops(&[sample_drop("d1", 15)]).unwrap();
            store
                .save_auth(&AuthRecord::new("tok".into(), None, Utc::now()))
                .unwrap();
            store
                .append_log(&LogEvent::new(LogLevel::Info, "hello"))
                .unwrap();
        }

        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(store.get_settings().unwrap().games, vec!["rust"]);
        assert_eq!(store.get_drops().unwrap()[0].id, "d1");
        assert_eq!(store.get_auth().unwrap().unwrap().access_token, "tok");
        assert_eq!(store.get_logs(5).unwrap()[0].message, "hello");
    }

    #[test]
    fn clear_auth_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .save_auth(&AuthRecord::new("tok".into(), None, Utc::now()))
            .unwrap();

        store.clear_auth().unwrap();
        store.clear_auth().unwrap();
        assert!(store.get_auth().unwrap().is_none());
        assert!(!dir.path().join(AUTH_FILE).exists());
    }

    #[test]
    fn log_file_is_capped() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        for i in 0..(LOG_RETENTION + 3) {
            store
                .append_log(&LogEvent::new(LogLevel::Debug, format!("{i}")))
                .unwrap();
        }

        let logs = store.get_logs(usize::MAX).unwrap();
        assert_eq!(logs.len(), LOG_RETENTION);
        assert_eq!(logs[0].message, "3");
    }

    #[test]
    fn log_appends_in_place_and_compacts() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        for i in 0..(LOG_RETENTION * 2 + 5) {
            store
                .append_log(&LogEvent::new(LogLevel::Info, format!("{i}")))
                .unwrap();
        }

        // compaction at 2x retention keeps the file from growing without bound
        let text = std::fs::read_to_string(dir.path().join(LOGS_FILE)).unwrap();
        assert_eq!(text.lines().count(), LOG_RETENTION + 4);

        let logs = store.get_logs(2).unwrap();
        let last = LOG_RETENTION * 2 + 4;
        assert_eq!(logs[0].message, format!("{}", last - 1));
        assert_eq!(logs[1].message, format!("{last}"));

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        let all = reopened.get_logs(usize::MAX).unwrap();
        assert_eq!(all.len(), LOG_RETENTION);
        assert_eq!(all[LOG_RETENTION - 1].message, format!("{last}"));
    }

    #[test]
    fn torn_log_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store
                .append_log(&LogEvent::new(LogLevel::Info, "kept"))
                .unwrap();
        }
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join(LOGS_FILE))
            .unwrap();
        file.write_all(b"{\"level\":\"INF").unwrap();

        let store = JsonFileStore::open(dir.path()).unwrap();
        let logs = store.get_logs(10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "kept");

        store
            .append_log(&LogEvent::new(LogLevel::Info, "after"))
            .unwrap();
        let reopened = JsonFileStore::open(dir.path()).unwrap();
        let messages: Vec<_> = reopened
            .get_logs(10)
            .unwrap()
            .into_iter()
            .map(|l| l.message)
            .collect();
        assert_eq!(messages, vec!["kept", "after"]);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), b"{not json").unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.get_settings(),
            Err(StoreError::Json { .. })
        ));
    }
}
