use std::net::SocketAddr;
use std::sync::Arc;

use infrastructure::PocketBaseClient;
use shared::{init_tracing, Config};
use stats_api::{build_router, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing().map_err(|e| anyhow::anyhow!("failed to initialise tracing: {e}"))?;

    let config = Config::from_env()?;
    let repo = PocketBaseClient::from_config(&config);
    info!(
        pocketbase_url = %repo.base_url(),
        collection = %repo.tasks_collection(),
        environment = %config.environment,
        "Using PocketBase"
    );

    let app = build_router(AppState::new(Arc::new(repo)), &config.cors_origin)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}
