use std::time::Duration;

use crate::domain::Settings;

/// Tunables for one run of the miner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerConfig {
    /// Pause between iterations.
    pub watch_interval: Duration,
    /// A stream watched this long is rediscovered.
    pub stream_max_age: Duration,
    /// Streams fetched per discovery.
    pub discovery_limit: usize,
    /// Random pick happens among this many top results.
    pub candidate_pool: usize,
    /// Pause after a failed iteration.
    pub error_cooldown: Duration,
    /// How long `stop()` waits for the loop before aborting it.
    pub stop_timeout: Duration,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            watch_interval: Duration::from_secs(20),
            stream_max_age: Duration::from_secs(30 * 60),
            discovery_limit: 20,
            candidate_pool: 5,
            error_cooldown: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl MinerConfig {
    /// Apply the user's watch interval on top of these defaults.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.watch_interval = Duration::from_secs(settings.watch_interval.max(1));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_comes_from_settings() {
        let settings = Settings {
            watch_interval: 45,
            ..Settings::default()
        };
        let config = MinerConfig::default().with_settings(&settings);
        assert_eq!(config.watch_interval, Duration::from_secs(45));
        assert_eq!(config.candidate_pool, 5);

        let zero = Settings {
            watch_interval: 0,
            ..Settings::default()
        };
        assert_eq!(
            MinerConfig::default().with_settings(&zero).watch_interval,
            Duration::from_secs(1)
        );
    }
}
