use std::time::Duration;

use tokio::time::Instant;

/// Elapsed time on the current stream.
#[derive(Debug, Clone)]
pub struct WatchSession {
    started: Instant,
}

impl WatchSession {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed().as_secs()
    }
}
