//! Service container for dependency injection.
//!
//! Owns the auth session, the platform clients, the store and the long-lived
//! services, and hands out the API state built from them.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use twitch_gql::client::install_rustls_provider;
use twitch_gql::{AuthController, AuthSession, CatalogClient, TransportClient, TwitchConfig};

use crate::api::AppState;
use crate::auth::LoginService;
use crate::broadcast::Broadcaster;
use crate::domain::StatusSnapshot;
use crate::error::Result;
use crate::journal::Journal;
use crate::miner::{Miner, StreamCatalog};
use crate::store::Store;

pub struct ServiceContainer {
    pub store: Arc<dyn Store>,
    pub broadcaster: Arc<Broadcaster>,
    pub journal: Journal,
    pub login: Arc<LoginService>,
    pub miner: Arc<Miner>,
    pub catalog: Arc<dyn StreamCatalog>,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    pub fn new(twitch: TwitchConfig, store: Arc<dyn Store>) -> Self {
        install_rustls_provider();

        let session = Arc::new(AuthSession::new());
        let transport = Arc::new(TransportClient::new(twitch, Arc::clone(&session)));
        let catalog: Arc<dyn StreamCatalog> = Arc::new(CatalogClient::new(Arc::clone(&transport)));
        let controller = Arc::new(AuthController::new(transport));

        let games_queue = store.ordered_games().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read games queue");
            Vec::new()
        });
        let broadcaster = Arc::new(Broadcaster::new(StatusSnapshot::idle(games_queue)));
        let journal = Journal::new(Arc::clone(&store), Arc::clone(&broadcaster));

        let login = Arc::new(LoginService::new(
            controller,
            Arc::clone(&store),
            journal.clone(),
        ));
        let miner = Arc::new(Miner::new(
            Arc::clone(&store),
            session,
            Arc::clone(&catalog),
            journal.clone(),
        ));

        Self {
            store,
            broadcaster,
            journal,
            login,
            miner,
            catalog,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Restore a saved login and optionally start mining.
    pub async fn initialize(&self, autostart: bool) -> Result<()> {
        let restored = self.login.restore().await?;
        if autostart {
            if restored {
                self.miner.start().await?;
            } else {
                info!("Autostart skipped: no saved login");
            }
        }
        Ok(())
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            start_time: Instant::now(),
            store: Arc::clone(&self.store),
            login: Arc::clone(&self.login),
            miner: Arc::clone(&self.miner),
            catalog: Arc::clone(&self.catalog),
            broadcaster: Arc::clone(&self.broadcaster),
            journal: self.journal.clone(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Stop the miner and any login poll, close push channels, then release
    /// waiters on the token.
    pub async fn shutdown(&self) {
        info!("Shutting down services");
        self.login.cancel();
        self.miner.stop().await;
        let closed = self.broadcaster.close();
        debug!(subscribers = closed, "Closed push subscribers");
        self.cancellation_token.cancel();
        info!("Services shut down");
    }
}
