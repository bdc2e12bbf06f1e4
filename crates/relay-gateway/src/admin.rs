//! Admin HTTP listener for identity registration.
//!
//! Two routes, plain HTTP/1.1 over a raw socket. Registration has to happen
//! before a client can connect or receive messages, so this surface stays
//! deliberately tiny.

use crate::GatewayResult;
use relay_database::RelayStore;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
}

/// The admin HTTP listener.
pub struct AdminServer {
    port: u16,
    store: RelayStore,
    shutdown_tx: broadcast::Sender<()>,
}

impl AdminServer {
    pub fn new(port: u16, store: RelayStore) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            port,
            store,
            shutdown_tx,
        }
    }

    /// Trigger shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the listener and serve requests until shutdown.
    pub async fn run(&self) -> GatewayResult<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        info!(port = self.port, "Admin HTTP server listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _)) => {
                            let store = self.store.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, store).await {
                                    error!(error = %e, "Admin connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Accept error");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Admin HTTP server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Read one HTTP request, dispatch it, write the response.
async fn handle_connection(mut stream: TcpStream, store: RelayStore) -> GatewayResult<()> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    debug!(request = %request_line.trim(), "Admin request");

    // Request line: METHOD /path HTTP/1.1
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();

    // Headers; only Content-Length matters here.
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 || line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }
    let body = String::from_utf8_lossy(&body).to_string();

    let (status_code, status_text, response_body) =
        handle_request(&store, &method, &path, &body).await;

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        response_body.len(),
        response_body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;

    Ok(())
}

/// Route a parsed request to its handler.
async fn handle_request(
    store: &RelayStore,
    method: &str,
    path: &str,
    body: &str,
) -> (u16, &'static str, String) {
    match (method, path) {
        ("POST", "/register") => register(store, body).await,
        ("GET", "/users") => list_users(store).await,
        _ => (
            404,
            "Not Found",
            r#"{"error":"not found"}"#.to_string(),
        ),
    }
}

async fn register(store: &RelayStore, body: &str) -> (u16, &'static str, String) {
    let request: RegisterRequest = match serde_json::from_str(body) {
        Ok(req) => req,
        Err(e) => {
            debug!(error = %e, "Bad register payload");
            return (
                400,
                "Bad Request",
                r#"{"error":"email is required"}"#.to_string(),
            );
        }
    };

    let identity = request.email.trim();
    if identity.is_empty() {
        return (
            400,
            "Bad Request",
            r#"{"error":"email is required"}"#.to_string(),
        );
    }

    match store.insert_user(identity).await {
        Ok(user) => {
            info!(identity = %identity, "Registered identity");
            match serde_json::to_string(&user) {
                Ok(json) => (200, "OK", json),
                Err(e) => internal_error(e),
            }
        }
        Err(e) => internal_error(e),
    }
}

async fn list_users(store: &RelayStore) -> (u16, &'static str, String) {
    match store.list_users().await {
        Ok(users) => match serde_json::to_string(&users) {
            Ok(json) => (200, "OK", json),
            Err(e) => internal_error(e),
        },
        Err(e) => internal_error(e),
    }
}

fn internal_error(e: impl std::fmt::Display) -> (u16, &'static str, String) {
    warn!(error = %e, "Admin request failed");
    (
        500,
        "Internal Server Error",
        r#"{"error":"internal error"}"#.to_string(),
    )
}
