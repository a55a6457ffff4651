use std::time::Duration;

use async_trait::async_trait;
use twitch_gql::{CatalogClient, StreamNode};

use super::WatchSession;
use crate::domain::{Game, StreamHandle};

/// What the miner needs from the platform.
#[async_trait]
pub trait StreamCatalog: Send + Sync {
    /// Live, drop-enabled streams for `game`, most relevant first.
    async fn discover_streams(&self, game: &Game, limit: usize) -> twitch_gql::Result<Vec<StreamNode>>;

    /// Issue the request that counts watch time on `stream`.
    async fn register_watch(&self, stream: &StreamHandle) -> twitch_gql::Result<()>;
}

#[async_trait]
impl StreamCatalog for CatalogClient {
    async fn discover_streams(&self, game: &Game, limit: usize) -> twitch_gql::Result<Vec<StreamNode>> {
        self.streams_for_game(&game.name, limit).await
    }

    async fn register_watch(&self, stream: &StreamHandle) -> twitch_gql::Result<()> {
        self.playback_access_token(&stream.user_login).await.map(|_| ())
    }
}

/// Decides when the current stream should be replaced.
#[async_trait]
pub trait StalenessPolicy: Send + Sync {
    async fn is_stale(&self, stream: &StreamHandle, session: &WatchSession) -> bool;
}

/// Treats a stream as live until it has been watched for `max_age`.
///
/// This is a placeholder and never asks the platform whether the channel is
/// still broadcasting. Swap in a policy backed by a real liveness query.
#[derive(Debug, Clone)]
pub struct SessionAgeStaleness {
    pub max_age: Duration,
}

#[async_trait]
impl StalenessPolicy for SessionAgeStaleness {
    async fn is_stale(&self, _stream: &StreamHandle, session: &WatchSession) -> bool {
        session.elapsed() >= self.max_age
    }
}

/// Called after each successful watch request.
#[async_trait]
pub trait DropProgressHook: Send + Sync {
    async fn on_watch(&self, game: &Game, stream: &StreamHandle, session: &WatchSession);
}

/// Progress tracking is not implemented; this hook does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDropProgress;

#[async_trait]
impl DropProgressHook for NoopDropProgress {
    async fn on_watch(&self, _game: &Game, _stream: &StreamHandle, _session: &WatchSession) {}
}
