use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use twitch_gql::AuthSession;

use super::catalog::{DropProgressHook, NoopDropProgress, SessionAgeStaleness, StalenessPolicy, StreamCatalog};
use super::config::MinerConfig;
use super::session::WatchSession;
use crate::domain::{Game, LogEvent, LogLevel, StatusSnapshot, StreamHandle};
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::store::Store;

struct ActiveStream {
    stream: StreamHandle,
    session: WatchSession,
}

#[derive(Default)]
struct MinerState {
    running: bool,
    current_game: Option<Game>,
    /// The stream and its watch session live and die together.
    active: Option<ActiveStream>,
    /// Seconds from sessions already finished during this run.
    total_watched: u64,
}

impl MinerState {
    fn finish_stream(&mut self) -> Option<StreamHandle> {
        let active = self.active.take()?;
        self.total_watched += active.session.elapsed_secs();
        Some(active.stream)
    }
}

struct RunHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    config: MinerConfig,
}

struct MinerInner {
    store: Arc<dyn Store>,
    session: Arc<AuthSession>,
    catalog: Arc<dyn StreamCatalog>,
    /// Overrides the session-age placeholder when set.
    staleness: Option<Arc<dyn StalenessPolicy>>,
    drop_progress: Arc<dyn DropProgressHook>,
    journal: Journal,
    state: RwLock<MinerState>,
}

/// Drives watch-time registration on a single background task.
pub struct Miner {
    inner: Arc<MinerInner>,
    base_config: MinerConfig,
    /// Held across the whole of `start` and `stop`, so a start issued while a
    /// stop is draining the old loop waits for it to finish.
    run: Mutex<Option<RunHandle>>,
}

impl Miner {
    pub fn new(
        store: Arc<dyn Store>,
        session: Arc<AuthSession>,
        catalog: Arc<dyn StreamCatalog>,
        journal: Journal,
    ) -> Self {
        Self {
            inner: Arc::new(MinerInner {
                store,
                session,
                catalog,
                staleness: None,
                drop_progress: Arc::new(NoopDropProgress),
                journal,
                state: RwLock::new(MinerState::default()),
            }),
            base_config: MinerConfig::default(),
            run: Mutex::new(None),
        }
    }

    /// Replace the tunables. The watch interval is still taken from
    /// settings at each start.
    pub fn with_config(mut self, config: MinerConfig) -> Self {
        self.base_config = config;
        self
    }

    /// Has no effect once the miner has been started.
    pub fn with_staleness(mut self, policy: Arc<dyn StalenessPolicy>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.staleness = Some(policy);
        }
        self
    }

    pub fn with_drop_progress(mut self, hook: Arc<dyn DropProgressHook>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.drop_progress = hook;
        }
        self
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.read().running
    }

    /// Spawn the loop. Returns `false` if it was already running.
    pub async fn start(&self) -> Result<bool> {
        let mut run = self.run.lock().await;
        if run.is_some() {
            debug!("Miner already running");
            return Ok(false);
        }
        if !self.inner.session.is_logged_in() {
            return Err(Error::Platform(twitch_gql::Error::NotAuthenticated));
        }

        let settings = self.inner.store.get_settings()?;
        let config = self.base_config.clone().with_settings(&settings);
        *self.inner.state.write() = MinerState {
            running: true,
            ..MinerState::default()
        };

        let token = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.inner),
            config.clone(),
            token.clone(),
        ));
        *run = Some(RunHandle {
            token,
            task,
            config: config.clone(),
        });
        drop(run);

        info!(interval = ?config.watch_interval, "Miner started");
        self.inner.journal.log(LogLevel::Info, "Miner started");
        self.inner.emit_status();
        Ok(true)
    }

    /// Cancel the loop and clear the current target. Returns `false` if it
    /// was not running.
    pub async fn stop(&self) -> bool {
        let mut run = self.run.lock().await;
        let Some(RunHandle {
            token,
            mut task,
            config,
        }) = run.take()
        else {
            return false;
        };

        token.cancel();
        match tokio::time::timeout(config.stop_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Miner task ended abnormally"),
            Err(_) => {
                warn!(timeout = ?config.stop_timeout, "Miner loop did not stop in time, aborting");
                task.abort();
                // an aborted task may still be mid-poll; wait until it is gone
                let _ = task.await;
            }
        }

        {
            let mut state = self.inner.state.write();
            state.finish_stream();
            state.current_game = None;
            state.running = false;
        }
        drop(run);

        info!("Miner stopped");
        self.inner.journal.log(LogLevel::Info, "Miner stopped");
        self.inner.emit_status();
        true
    }

    pub fn status(&self) -> StatusSnapshot {
        self.inner.snapshot()
    }
}

async fn run_loop(inner: Arc<MinerInner>, config: MinerConfig, token: CancellationToken) {
    debug!("Mining loop started");
    loop {
        let iteration = AssertUnwindSafe(inner.tick(&config)).catch_unwind();
        let wait = tokio::select! {
            _ = token.cancelled() => break,
            result = iteration => match result {
                Ok(Ok(())) => config.watch_interval,
                Ok(Err(e)) => {
                    if e.is_unauthorized() {
                        inner.expire_login();
                    } else {
                        inner.clear_stream();
                    }
                    let level = if e.is_transient() { LogLevel::Warning } else { LogLevel::Error };
                    inner.journal.log(level, format!("Mining iteration failed: {e}"));
                    config.error_cooldown
                }
                Err(panic) => {
                    inner.clear_stream();
                    inner.journal.log(
                        LogLevel::Error,
                        format!("Mining iteration panicked: {}", panic_message(&*panic)),
                    );
                    config.error_cooldown
                }
            },
        };
        inner.emit_status();

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }
    debug!("Mining loop exited");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl MinerInner {
    async fn tick(&self, config: &MinerConfig) -> Result<()> {
        if !self.session.is_logged_in() {
            self.journal.log(LogLevel::Warning, "Not authenticated, waiting for login");
            return Ok(());
        }
        if let Some(record) = self.store.get_auth()?.filter(|r| !r.is_valid_at(Utc::now())) {
            info!(expired_at = %record.expires_at, "Stored login expired");
            self.expire_login();
            return Ok(());
        }

        let settings = self.store.get_settings()?;
        if settings.games.is_empty() {
            self.release_target("watch list is empty");
            self.journal.log(LogLevel::Info, "Watch list is empty");
            return Ok(());
        }

        let games = self.store.get_games()?;
        let Some(game) = settings.games.iter().find_map(|id| games.get(id)).cloned() else {
            self.release_target("no game on the watch list is known");
            self.journal
                .log(LogLevel::Warning, "No game on the watch list is known");
            return Ok(());
        };

        self.select_game(&game);

        let current = self.current();
        let needs_stream = match &current {
            None => true,
            Some((stream, session)) => {
                let stale = self.is_stale(config, stream, session).await;
                if stale {
                    self.clear_stream();
                    self.journal.record(
                        LogEvent::new(
                            LogLevel::Info,
                            format!("Leaving {} after {}s, rediscovering", stream.user_name, session.elapsed_secs()),
                        )
                        .with_game(&game.id)
                        .with_stream(&stream.id),
                    );
                }
                stale
            }
        };

        if needs_stream && !self.adopt_stream(&game, config).await? {
            return Ok(());
        }

        let Some((stream, session)) = self.current() else {
            return Ok(());
        };

        match self.catalog.register_watch(&stream).await {
            Ok(()) => {
                self.journal.record(
                    LogEvent::new(
                        LogLevel::Success,
                        format!(
                            "Watching {} for {} ({}s)",
                            stream.user_name,
                            game.display_name,
                            session.elapsed_secs()
                        ),
                    )
                    .with_game(&game.id)
                    .with_stream(&stream.id),
                );
                self.drop_progress.on_watch(&game, &stream, &session).await;
            }
            Err(e) if e.is_unauthorized() => {
                warn!(error = %e, "Watch request rejected the login");
                self.expire_login();
            }
            Err(e) => {
                self.clear_stream();
                let level = if e.is_transient() { LogLevel::Warning } else { LogLevel::Error };
                self.journal.record(
                    LogEvent::new(
                        level,
                        format!("Watch request for {} failed: {e}", stream.user_login),
                    )
                    .with_game(&game.id)
                    .with_stream(&stream.id),
                );
            }
        }
        Ok(())
    }

    async fn is_stale(&self, config: &MinerConfig, stream: &StreamHandle, session: &WatchSession) -> bool {
        match &self.staleness {
            Some(policy) => policy.is_stale(stream, session).await,
            None => {
                SessionAgeStaleness {
                    max_age: config.stream_max_age,
                }
                .is_stale(stream, session)
                .await
            }
        }
    }

    fn current(&self) -> Option<(StreamHandle, WatchSession)> {
        self.state
            .read()
            .active
            .as_ref()
            .map(|a| (a.stream.clone(), a.session.clone()))
    }

    fn clear_stream(&self) {
        self.state.write().finish_stream();
    }

    /// Drop both the stream and the game, so nothing is reported as the
    /// target while the loop idles.
    fn release_target(&self, reason: &str) {
        let previous = {
            let mut state = self.state.write();
            state.finish_stream();
            state.current_game.take()
        };
        if let Some(game) = previous {
            self.journal.record(
                LogEvent::new(LogLevel::Info, format!("Leaving {}: {reason}", game.display_name))
                    .with_game(&game.id),
            );
        }
    }

    /// Forget a login upstream no longer honours. The loop keeps running and
    /// idles until a new login arrives.
    fn expire_login(&self) {
        self.session.clear();
        if let Err(e) = self.store.clear_auth() {
            warn!(error = %e, "Failed to clear stored login");
        }
        self.release_target("login expired");
        self.journal
            .log(LogLevel::Warning, "Twitch login expired or was revoked; log in again");
    }

    /// Switch to `game` if it differs from the current one, dropping the
    /// stream and its session.
    fn select_game(&self, game: &Game) {
        let mut state = self.state.write();
        if !state.running {
            return;
        }
        if state.current_game.as_ref().is_some_and(|g| g.id == game.id) {
            state.current_game = Some(game.clone());
            return;
        }
        let previous = state.current_game.replace(game.clone());
        state.finish_stream();
        drop(state);

        let message = match previous {
            Some(prev) => format!("Switching from {} to {}", prev.display_name, game.display_name),
            None => format!("Selected {}", game.display_name),
        };
        self.journal
            .record(LogEvent::new(LogLevel::Info, message).with_game(&game.id));
    }

    /// Discover streams and adopt one at random from the top candidates.
    /// Returns `false` when nothing is live.
    async fn adopt_stream(&self, game: &Game, config: &MinerConfig) -> Result<bool> {
        let mut nodes = self
            .catalog
            .discover_streams(game, config.discovery_limit)
            .await?;
        if nodes.is_empty() {
            self.journal.record(
                LogEvent::new(
                    LogLevel::Warning,
                    format!("No live drop-enabled streams for {}", game.display_name),
                )
                .with_game(&game.id),
            );
            return Ok(false);
        }

        let pool = nodes.len().min(config.candidate_pool.max(1));
        let node = nodes.swap_remove(rand::random_range(0..pool));
        let stream = StreamHandle::from_node(node, &game.id);

        {
            let mut state = self.state.write();
            if !state.running {
                return Ok(false);
            }
            state.finish_stream();
            state.active = Some(ActiveStream {
                stream: stream.clone(),
                session: WatchSession::start(),
            });
        }

        self.journal.record(
            LogEvent::new(
                LogLevel::Success,
                format!(
                    "Now watching {} ({} viewers): {}",
                    stream.user_name, stream.viewer_count, stream.title
                ),
            )
            .with_game(&game.id)
            .with_stream(&stream.id),
        );
        Ok(true)
    }

    fn snapshot(&self) -> StatusSnapshot {
        let games_queue = self.store.ordered_games().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read games queue");
            Vec::new()
        });
        let state = self.state.read();
        let mut snapshot = StatusSnapshot::idle(games_queue);
        snapshot.total_watched = state.total_watched;
        if !state.running {
            return snapshot;
        }

        snapshot.is_running = true;
        snapshot.current_game = state.current_game.clone();
        if let Some(active) = &state.active {
            snapshot.watch_duration = active.session.elapsed_secs();
            snapshot.current_stream = Some(active.stream.clone());
        }
        snapshot.total_watched += snapshot.watch_duration;
        snapshot
    }

    fn emit_status(&self) {
        self.journal.status(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use parking_lot::Mutex;
    use twitch_gql::StreamNode;

    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::domain::{AuthRecord, Settings};
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct FakeCatalog {
        streams: Mutex<HashMap<String, Vec<StreamNode>>>,
        fail_watch: AtomicBool,
        reject_token: AtomicBool,
        fail_discovery: AtomicBool,
        discoveries: AtomicUsize,
        watched: Mutex<Vec<String>>,
    }

    impl FakeCatalog {
        fn with_streams(self, slug: &str, count: usize) -> Self {
            let nodes = (0..count)
                .map(|i| StreamNode {
                    id: format!("{slug}-{i}"),
                    user_login: format!("{slug}_caster{i}"),
                    user_name: format!("Caster{i}"),
                    title: "drops".into(),
                    viewer_count: 1000 - i as u64,
                    language: "en".into(),
                })
                .collect();
            self.streams.lock().insert(slug.to_string(), nodes);
            self
        }
    }

    #[async_trait]
    impl StreamCatalog for FakeCatalog {
        async fn discover_streams(&self, game: &Game, limit: usize) -> twitch_gql::Result<Vec<StreamNode>> {
            self.discoveries.fetch_add(1, Ordering::SeqCst);
            if self.fail_discovery.load(Ordering::SeqCst) {
                return Err(twitch_gql::Error::GraphQlTransport { status: 502 });
            }
            let mut nodes = self.streams.lock().get(&game.name).cloned().unwrap_or_default();
            nodes.truncate(limit);
            Ok(nodes)
        }

        async fn register_watch(&self, stream: &StreamHandle) -> twitch_gql::Result<()> {
            if self.reject_token.load(Ordering::SeqCst) {
                return Err(twitch_gql::Error::GraphQlTransport { status: 401 });
            }
            if self.fail_watch.load(Ordering::SeqCst) {
                return Err(twitch_gql::Error::GraphQlTransport { status: 500 });
            }
            self.watched.lock().push(stream.id.clone());
            Ok(())
        }
    }

    struct Fixture {
        miner: Miner,
        store: Arc<MemoryStore>,
        catalog: Arc<FakeCatalog>,
        session: Arc<AuthSession>,
    }

    fn fixture(catalog: FakeCatalog, config: MinerConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(AuthSession::new());
        session.authenticate("token", None);
        let catalog = Arc::new(catalog);
        let journal = Journal::new(store.clone(), Arc::new(Broadcaster::default()));
        let miner = Miner::new(store.clone(), session.clone(), catalog.clone(), journal)
            .with_config(config);
        Fixture {
            miner,
            store,
            catalog,
            session,
        }
    }

    fn add_games(store: &MemoryStore, names: &[&str]) {
        for name in names {
            store.add_game(Game::from_display_name(name)).unwrap();
        }
    }

    fn mark_running(miner: &Miner) {
        miner.inner.state.write().running = true;
    }

    #[tokio::test]
    async fn picks_first_known_game() {
        let f = fixture(
            FakeCatalog::default().with_streams("gameb", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["gameB"]);
        f.store
            .reorder_games(vec!["gamea".into(), "gameb".into()])
            .unwrap();
        mark_running(&f.miner);

        f.miner.inner.tick(&MinerConfig::default()).await.unwrap();

        let status = f.miner.status();
        assert_eq!(status.current_game.unwrap().id, "gameb");
        assert_eq!(status.current_stream.unwrap().game_id, "gameb");
        assert_eq!(f.catalog.watched.lock().len(), 1);
    }

    #[tokio::test]
    async fn picks_among_top_candidates() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 12),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);
        mark_running(&f.miner);

        for _ in 0..20 {
            f.miner.inner.clear_stream();
            f.miner.inner.tick(&MinerConfig::default()).await.unwrap();
            let stream = f.miner.status().current_stream.unwrap();
            let index: usize = stream.id.trim_start_matches("rust-").parse().unwrap();
            assert!(index < 5, "picked {index}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn switching_game_resets_session() {
        let f = fixture(
            FakeCatalog::default()
                .with_streams("rust", 3)
                .with_streams("valorant", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust", "Valorant"]);
        mark_running(&f.miner);
        let config = MinerConfig::default();

        f.miner.inner.tick(&config).await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(f.miner.status().watch_duration, 120);

        f.store
            .reorder_games(vec!["valorant".into(), "rust".into()])
            .unwrap();
        f.miner.inner.tick(&config).await.unwrap();

        let status = f.miner.status();
        assert_eq!(status.current_game.unwrap().id, "valorant");
        assert_eq!(status.current_stream.unwrap().game_id, "valorant");
        assert_eq!(status.watch_duration, 0);
        assert_eq!(status.total_watched, 120);
    }

    #[tokio::test]
    async fn failed_watch_clears_stream() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);
        mark_running(&f.miner);
        f.catalog.fail_watch.store(true, Ordering::SeqCst);

        f.miner.inner.tick(&MinerConfig::default()).await.unwrap();

        let status = f.miner.status();
        assert!(status.current_stream.is_none());
        assert_eq!(status.current_game.unwrap().id, "rust");
        let logs = f.store.get_logs(10).unwrap();
        assert!(logs
            .iter()
            .any(|l| l.level == LogLevel::Warning && l.message.starts_with("Watch request")));
        assert!(f.session.is_logged_in());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_stream_is_rediscovered() {
        let config = MinerConfig {
            stream_max_age: Duration::from_secs(60),
            ..MinerConfig::default()
        };
        let f = fixture(FakeCatalog::default().with_streams("rust", 3), config.clone());
        add_games(&f.store, &["Rust"]);
        mark_running(&f.miner);

        f.miner.inner.tick(&config).await.unwrap();
        f.miner.inner.tick(&config).await.unwrap();
        assert_eq!(f.catalog.discoveries.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        f.miner.inner.tick(&config).await.unwrap();
        assert_eq!(f.catalog.discoveries.load(Ordering::SeqCst), 2);
        assert_eq!(f.miner.status().watch_duration, 0);
    }

    struct AlwaysStale;

    #[async_trait]
    impl StalenessPolicy for AlwaysStale {
        async fn is_stale(&self, _stream: &StreamHandle, _session: &WatchSession) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct CountingHook(AtomicUsize);

    #[async_trait]
    impl DropProgressHook for CountingHook {
        async fn on_watch(&self, _game: &Game, _stream: &StreamHandle, _session: &WatchSession) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn custom_hooks_are_used() {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(AuthSession::new());
        session.authenticate("token", None);
        let catalog = Arc::new(FakeCatalog::default().with_streams("rust", 3));
        let hook = Arc::new(CountingHook::default());
        let journal = Journal::new(store.clone(), Arc::new(Broadcaster::default()));
        let miner = Miner::new(store.clone(), session, catalog.clone(), journal)
            .with_staleness(Arc::new(AlwaysStale))
            .with_drop_progress(hook.clone());
        add_games(&store, &["Rust"]);
        mark_running(&miner);

        for _ in 0..3 {
            miner.inner.tick(&MinerConfig::default()).await.unwrap();
        }

        assert_eq!(catalog.discoveries.load(Ordering::SeqCst), 3);
        assert_eq!(hook.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unauthenticated_tick_does_nothing() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);
        mark_running(&f.miner);
        f.session.clear();

        f.miner.inner.tick(&MinerConfig::default()).await.unwrap();

        assert_eq!(f.catalog.discoveries.load(Ordering::SeqCst), 0);
        assert!(f.miner.status().current_game.is_none());
    }

    #[tokio::test]
    async fn start_requires_login() {
        let f = fixture(FakeCatalog::default(), MinerConfig::default());
        f.session.clear();

        assert!(matches!(
            f.miner.start().await,
            Err(Error::Platform(twitch_gql::Error::NotAuthenticated))
        ));
        assert!(!f.miner.is_running());
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);

        assert!(!f.miner.stop().await);
        assert!(f.miner.start().await.unwrap());
        assert!(!f.miner.start().await.unwrap());
        assert!(f.miner.is_running());

        assert!(f.miner.stop().await);
        assert!(!f.miner.stop().await);
        assert!(!f.miner.is_running());
    }

    #[tokio::test]
    async fn stop_interrupts_long_interval() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);
        f.store
            .save_settings(&Settings {
                games: vec!["rust".into()],
                watch_interval: 300,
                ..Settings::default()
            })
            .unwrap();

        f.miner.start().await.unwrap();
        // let the first iteration finish and the loop go to sleep
        for _ in 0..50 {
            if !f.catalog.watched.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(f.miner.status().current_stream.is_some());

        let started = Instant::now();
        assert!(f.miner.stop().await);
        assert!(started.elapsed() < Duration::from_secs(2));

        let status = f.miner.status();
        assert!(!status.is_running);
        assert!(status.current_game.is_none());
        assert!(status.current_stream.is_none());
    }

    #[tokio::test]
    async fn iteration_errors_do_not_kill_the_loop() {
        let config = MinerConfig {
            error_cooldown: Duration::from_millis(10),
            ..MinerConfig::default()
        };
        let catalog = FakeCatalog::default().with_streams("rust", 3);
        catalog.fail_discovery.store(true, Ordering::SeqCst);
        let f = fixture(catalog, config);
        add_games(&f.store, &["Rust"]);

        f.miner.start().await.unwrap();
        for _ in 0..100 {
            if f.catalog.discoveries.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(f.catalog.discoveries.load(Ordering::SeqCst) >= 3);
        assert!(f.miner.is_running());

        let failures = f
            .store
            .get_logs(100)
            .unwrap()
            .into_iter()
            .filter(|l| l.message.starts_with("Mining iteration failed"))
            .count();
        assert!(failures >= 2);
        f.miner.stop().await;
    }

    #[tokio::test]
    async fn idle_snapshot_has_no_target_across_cycles() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);

        for _ in 0..3 {
            f.miner.start().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            f.miner.stop().await;
            let status = f.miner.status();
            assert!(status.current_stream.is_none());
            assert!(status.current_game.is_none());
            assert_eq!(status.games_queue.len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emptied_watch_list_releases_target() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);
        mark_running(&f.miner);
        let config = MinerConfig::default();

        f.miner.inner.tick(&config).await.unwrap();
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(f.miner.status().watch_duration, 200);

        f.store.remove_game("rust").unwrap();
        f.miner.inner.tick(&config).await.unwrap();

        let status = f.miner.status();
        assert!(status.is_running);
        assert!(status.current_game.is_none());
        assert!(status.current_stream.is_none());
        assert_eq!(status.watch_duration, 0);
        assert_eq!(status.total_watched, 200);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(f.miner.status().total_watched, 200);
        assert_eq!(f.catalog.watched.lock().len(), 1);
    }

    #[tokio::test]
    async fn unknown_watch_list_releases_target() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);
        mark_running(&f.miner);
        f.miner.inner.tick(&MinerConfig::default()).await.unwrap();
        assert!(f.miner.status().current_stream.is_some());

        let mut settings = f.store.get_settings().unwrap();
        settings.games = vec!["ghost".into()];
        f.store.save_settings(&settings).unwrap();
        f.miner.inner.tick(&MinerConfig::default()).await.unwrap();

        let status = f.miner.status();
        assert!(status.current_game.is_none());
        assert!(status.current_stream.is_none());
        assert_eq!(f.catalog.watched.lock().len(), 1);
    }

    #[tokio::test]
    async fn rejected_token_logs_out() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);
        f.store
            .save_auth(&AuthRecord::new("token".into(), None, Utc::now()))
            .unwrap();
        mark_running(&f.miner);
        f.catalog.reject_token.store(true, Ordering::SeqCst);

        f.miner.inner.tick(&MinerConfig::default()).await.unwrap();

        assert!(!f.session.is_logged_in());
        assert!(f.store.get_auth().unwrap().is_none());
        let status = f.miner.status();
        assert!(status.current_stream.is_none());
        assert!(status.current_game.is_none());
        assert!(f
            .store
            .get_logs(20)
            .unwrap()
            .iter()
            .any(|l| l.level == LogLevel::Warning && l.message.contains("log in again")));

        // later ticks wait for a new login instead of calling upstream
        f.miner.inner.tick(&MinerConfig::default()).await.unwrap();
        assert_eq!(f.catalog.discoveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_login_is_dropped_before_watching() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);
        f.store
            .save_auth(&AuthRecord::new(
                "token".into(),
                None,
                Utc::now() - ChronoDuration::hours(5),
            ))
            .unwrap();
        mark_running(&f.miner);

        f.miner.inner.tick(&MinerConfig::default()).await.unwrap();

        assert_eq!(f.catalog.discoveries.load(Ordering::SeqCst), 0);
        assert!(f.catalog.watched.lock().is_empty());
        assert!(!f.session.is_logged_in());
        assert!(f.store.get_auth().unwrap().is_none());
    }

    #[tokio::test]
    async fn start_issued_during_stop_keeps_a_live_loop() {
        let f = fixture(
            FakeCatalog::default().with_streams("rust", 3),
            MinerConfig::default(),
        );
        add_games(&f.store, &["Rust"]);
        f.store
            .save_settings(&Settings {
                games: vec!["rust".into()],
                watch_interval: 1,
                ..Settings::default()
            })
            .unwrap();

        assert!(f.miner.start().await.unwrap());
        for _ in 0..50 {
            if !f.catalog.watched.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let (stopped, restarted) = tokio::join!(f.miner.stop(), async {
            tokio::task::yield_now().await;
            f.miner.start().await
        });
        assert!(stopped);
        assert!(restarted.unwrap());
        assert!(f.miner.is_running());
        assert!(f.miner.status().is_running);

        let before = f.catalog.watched.lock().len();
        for _ in 0..250 {
            if f.catalog.watched.lock().len() > before + 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(f.catalog.watched.lock().len() > before + 1);
        assert!(f.miner.status().current_stream.is_some());
        f.miner.stop().await;
    }
}
