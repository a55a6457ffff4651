use std::sync::Arc;

use anyhow::Context;
use drops_miner::api::ApiServer;
use drops_miner::config::AppConfig;
use drops_miner::logging::init_logging;
use drops_miner::services::ServiceContainer;
use drops_miner::store::JsonFileStore;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load();
    let _log_guard = init_logging(&config.log_dir).context("initializing logging")?;

    let store = JsonFileStore::open(&config.data_dir).context("opening data directory")?;
    info!(data_dir = %config.data_dir.display(), "drops-miner starting");

    let container = ServiceContainer::new(config.twitch_config(), Arc::new(store));
    if let Err(e) = container.initialize(config.autostart).await {
        error!(error = %e, "Startup tasks failed");
    }

    let server = ApiServer::new(
        config.api_config(),
        container.app_state(),
        container.cancellation_token(),
    );

    let shutdown_token = container.cancellation_token();
    let server_task = tokio::spawn(async move { server.run().await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
        _ = shutdown_token.cancelled() => {}
    }

    container.shutdown().await;
    server_task
        .await
        .context("joining API server")?
        .context("running API server")?;
    Ok(())
}
