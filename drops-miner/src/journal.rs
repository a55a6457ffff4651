//! Single sink for everything the miner reports: mirrored to `tracing`,
//! persisted through the store and pushed through the broadcaster.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::domain::{LogEvent, LogLevel, StatusSnapshot};
use crate::store::Store;

#[derive(Clone)]
pub struct Journal {
    store: Arc<dyn Store>,
    broadcaster: Arc<Broadcaster>,
}

impl Journal {
    pub fn new(store: Arc<dyn Store>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.record(LogEvent::new(level, message));
    }

    pub fn record(&self, event: LogEvent) {
        let game = event.game_id.as_deref().unwrap_or_default();
        let stream = event.stream_id.as_deref().unwrap_or_default();
        match event.level {
            LogLevel::Debug => debug!(game, stream, "{}", event.message),
            LogLevel::Info | LogLevel::Success => info!(game, stream, "{}", event.message),
            LogLevel::Warning => warn!(game, stream, "{}", event.message),
            LogLevel::Error => error!(game, stream, "{}", event.message),
        }

        if let Err(e) = self.store.append_log(&event) {
            warn!(error = %e, "Failed to persist log event");
        }
        self.broadcaster.publish_log(event);
    }

    pub fn status(&self, snapshot: StatusSnapshot) {
        if let Err(e) = self.store.save_status(&snapshot) {
            warn!(error = %e, "Failed to persist status snapshot");
        }
        self.broadcaster.publish_status(snapshot);
    }
}
