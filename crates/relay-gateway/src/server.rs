//! WebSocket transport listener.

use crate::{connection, GatewayResult};
use relay_database::RelayStore;
use relay_engine::DeliveryEngine;
use relay_registry::ConnectionRegistry;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

/// The WebSocket listener clients connect to for sending and receiving
/// messages.
pub struct GatewayServer {
    port: u16,
    store: RelayStore,
    registry: ConnectionRegistry,
    engine: DeliveryEngine,
    auth_key: Option<String>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GatewayServer {
    pub fn new(
        port: u16,
        store: RelayStore,
        registry: ConnectionRegistry,
        engine: DeliveryEngine,
        auth_key: Option<String>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            port,
            store,
            registry,
            engine,
            auth_key,
            shutdown_tx,
        }
    }

    /// Trigger shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the listener and accept connections until shutdown.
    pub async fn run(&self) -> GatewayResult<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        info!(port = self.port, "WebSocket gateway listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            let store = self.store.clone();
                            let registry = self.registry.clone();
                            let engine = self.engine.clone();
                            let auth_key = self.auth_key.clone();
                            tokio::spawn(async move {
                                if let Err(e) =
                                    connection::handle_socket(stream, store, registry, engine, auth_key).await
                                {
                                    error!(peer = %peer, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Accept error");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("WebSocket gateway shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
