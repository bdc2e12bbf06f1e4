//! Daemon startup and shutdown wiring.

use std::sync::Arc;

use relay_config_and_utils::{Config, Paths};
use relay_database::RelayStore;
use relay_engine::DeliveryEngine;
use relay_gateway::{AdminServer, GatewayServer};
use relay_registry::ConnectionRegistry;
use tracing::{error, info};

/// Run the relay daemon until interrupted.
///
/// Brings up the store, registry, and engine, then runs both listeners
/// until Ctrl-C, at which point they are shut down in order and the store
/// is closed cleanly.
pub async fn run_daemon(config: Config, paths: Paths) -> Result<(), Box<dyn std::error::Error>> {
    paths.ensure_dirs()?;

    let db_path = config.database_path(&paths);
    let store = RelayStore::open(&db_path).await?;

    let registry = ConnectionRegistry::new();
    let engine = DeliveryEngine::new(store.clone(), registry.clone());

    let gateway = Arc::new(GatewayServer::new(
        config.ws_port,
        store.clone(),
        registry.clone(),
        engine,
        config.auth_key.clone(),
    ));
    let admin = Arc::new(AdminServer::new(config.http_port, store.clone()));

    let gateway_task = tokio::spawn({
        let gateway = gateway.clone();
        async move {
            if let Err(e) = gateway.run().await {
                error!(error = %e, "WebSocket gateway failed");
            }
        }
    });
    let admin_task = tokio::spawn({
        let admin = admin.clone();
        async move {
            if let Err(e) = admin.run().await {
                error!(error = %e, "Admin HTTP server failed");
            }
        }
    });

    info!(
        ws_port = config.ws_port,
        http_port = config.http_port,
        "Relay daemon started"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    gateway.shutdown();
    admin.shutdown();
    let _ = gateway_task.await;
    let _ = admin_task.await;

    store.close().await?;
    info!("Relay daemon stopped");

    Ok(())
}
