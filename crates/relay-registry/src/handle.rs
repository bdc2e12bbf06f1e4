//! Live connection handles.

use relay_protocol_types::ServerFrame;
use thiserror::Error;
use tokio::sync::mpsc;

/// A frame could not be handed to the connection's task.
#[derive(Error, Debug)]
#[error("could not push to connection {0}")]
pub struct PushFailed(pub u64);

/// Events delivered to a connection's task through its outbound channel.
///
/// The per-connection task is the only writer of its socket; both pushed
/// frames and the eviction close signal arrive through this channel.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Write this frame to the socket.
    Frame(ServerFrame),
    /// Close the transport (sent to an evicted connection).
    Close,
}

/// A live, bidirectional connection bound to exactly one identity.
///
/// Cloning the handle clones the channel sender; the underlying transport
/// is owned by the connection task itself.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    identity: String,
    events: mpsc::Sender<ConnectionEvent>,
}

impl ConnectionHandle {
    /// Create a handle for a connection task's event channel.
    pub fn new(id: u64, identity: &str, events: mpsc::Sender<ConnectionEvent>) -> Self {
        Self {
            id,
            identity: identity.to_string(),
            events,
        }
    }

    /// Process-unique connection id, used to guard stale removals.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The authenticated identity this connection is bound to.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Push a frame to the connection without waiting.
    ///
    /// Fails when the task has ended or its outbound buffer is full. Both
    /// count as a failed delivery attempt; waiting on a full buffer here
    /// could block a sender whose own task is the one that must drain it.
    pub fn push(&self, frame: ServerFrame) -> Result<(), PushFailed> {
        self.events
            .try_send(ConnectionEvent::Frame(frame))
            .map_err(|_| PushFailed(self.id))
    }

    /// Ask the connection task to close its transport. Best effort.
    pub async fn close(&self) {
        let _ = self.events.send(ConnectionEvent::Close).await;
    }
}
