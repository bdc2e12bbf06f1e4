//! Per-connection WebSocket handling.

use crate::GatewayResult;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use relay_database::RelayStore;
use relay_engine::{BacklogSink, DeliveryEngine};
use relay_protocol_types::{ClientCommand, CommandKind, ServerFrame};
use relay_registry::{ConnectionEvent, ConnectionHandle, ConnectionRegistry, PushFailed};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

/// Outbound frames queued per connection. A full buffer fails the push and
/// the message falls back to the pending queue.
const OUTBOUND_BUFFER: usize = 64;

/// Writes backlog frames straight to the socket, bypassing the outbound
/// buffer; the connection task holds the writer exclusively during a drain.
struct SocketSink<'a> {
    ws_tx: &'a mut SplitSink<WebSocketStream<TcpStream>, Message>,
    connection_id: u64,
}

impl BacklogSink for SocketSink<'_> {
    async fn deliver(&mut self, frame: ServerFrame) -> Result<(), PushFailed> {
        let json = frame.to_json().map_err(|_| PushFailed(self.connection_id))?;
        self.ws_tx
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| PushFailed(self.connection_id))
    }
}

/// Accept a WebSocket handshake and run the connection to completion.
///
/// The identity is taken from the request path (`/alice` connects as
/// `alice`), checked against the user directory, and bound to the
/// connection for its whole lifetime.
pub async fn handle_socket(
    stream: TcpStream,
    store: RelayStore,
    registry: ConnectionRegistry,
    engine: DeliveryEngine,
    auth_key: Option<String>,
) -> GatewayResult<()> {
    let mut request_path = None;
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        request_path = Some(req.uri().path().to_string());
        Ok(resp)
    })
    .await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let identity = match request_path.as_deref().and_then(identity_from_path) {
        Some(identity) => identity,
        None => {
            let frame = ServerFrame::error("identity is required in the connection path");
            let _ = ws_tx.send(Message::Text(frame.to_json()?.into())).await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return Ok(());
        }
    };

    if !store.user_exists(&identity).await? {
        warn!(identity = %identity, "Rejected connection for unregistered identity");
        let frame = ServerFrame::error(format!("unknown identity: {identity}"));
        let _ = ws_tx.send(Message::Text(frame.to_json()?.into())).await;
        let _ = ws_tx.send(Message::Close(None)).await;
        return Ok(());
    }

    let connection_id = registry.next_connection_id();
    let (event_tx, mut event_rx) = mpsc::channel::<ConnectionEvent>(OUTBOUND_BUFFER);
    let handle = ConnectionHandle::new(connection_id, &identity, event_tx);

    if let Some(previous) = registry.register(handle).await {
        previous.close().await;
    }
    info!(identity = %identity, connection_id, "Client connected");

    // Backlog frames go out before any command handling, directly on the
    // socket writer so a large backlog is not limited by the outbound
    // buffer.
    let mut sink = SocketSink {
        ws_tx: &mut ws_tx,
        connection_id,
    };
    match engine.drain_backlog(&identity, &mut sink).await {
        Ok(0) => {}
        Ok(count) => info!(identity = %identity, count, "Delivered pending backlog"),
        Err(e) => error!(identity = %identity, error = %e, "Backlog drain failed"),
    }

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(ConnectionEvent::Frame(frame)) => {
                        let json = frame.to_json()?;
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(ConnectionEvent::Close) => {
                        debug!(identity = %identity, connection_id, "Connection evicted");
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_command(&engine, auth_key.as_deref(), &identity, &text).await;
                        let json = reply.to_json()?;
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(identity = %identity, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    registry.remove(&identity, connection_id).await;
    info!(identity = %identity, connection_id, "Client disconnected");

    Ok(())
}

/// Decode one inbound text frame into the reply frame.
///
/// Failures never tear the connection down; every category maps to an
/// error frame and the client may try again.
async fn handle_command(
    engine: &DeliveryEngine,
    auth_key: Option<&str>,
    identity: &str,
    text: &str,
) -> ServerFrame {
    let command = match ClientCommand::from_json(text) {
        Ok(command) => command,
        Err(e) => {
            debug!(identity = %identity, error = %e, "Unparseable client frame");
            return ServerFrame::error("invalid message format");
        }
    };

    if let Some(expected) = auth_key {
        if command.auth_token.as_deref() != Some(expected) {
            warn!(identity = %identity, "Rejected command with bad auth token");
            return ServerFrame::error("authentication failed");
        }
    }

    // The sender field is advisory. The connection's authenticated identity
    // is what actually gets written, so a mismatched claim is rejected.
    if let Some(claimed) = command.sender.as_deref() {
        if claimed != identity {
            warn!(identity = %identity, claimed = %claimed, "Rejected spoofed sender");
            return ServerFrame::error("sender does not match connection identity");
        }
    }

    match command.cmd {
        CommandKind::Send => {
            let receiver = command.receiver.as_deref().unwrap_or("");
            let body = command.body.as_deref().unwrap_or("");
            match engine.send(identity, receiver, body).await {
                Ok(receipt) => ServerFrame::ack(receipt.message_id, receipt.status),
                Err(e) => ServerFrame::error(e.to_string()),
            }
        }
    }
}

/// Extract the identity from a WebSocket request path.
///
/// `/alice%40example.com/ignored` yields `alice@example.com`. Returns None
/// for an empty path segment.
fn identity_from_path(path: &str) -> Option<String> {
    let segment = path.trim_start_matches('/');
    let segment = segment.split('/').next().unwrap_or("");
    let decoded = percent_decode(segment);
    let decoded = decoded.trim();
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.to_string())
    }
}

/// Percent-decode a path segment.
fn percent_decode(s: &str) -> String {
    let mut result = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                result.push(byte);
            }
        } else {
            let mut buf = [0u8; 4];
            result.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }

    String::from_utf8_lossy(&result).to_string()
}
