//! Store-and-forward delivery.

use crate::{EngineError, EngineResult};
use relay_database::RelayStore;
use relay_protocol_types::{MessageStatus, ServerFrame};
use relay_registry::{ConnectionRegistry, PushFailed};
use std::future::Future;
use tracing::{debug, warn};

/// Outcome of a send, reported back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Store-assigned message id.
    pub message_id: i64,
    /// Final status after the delivery attempt.
    pub status: MessageStatus,
}

/// Destination for backlog frames during a drain.
///
/// The gateway implements this over the connection's socket writer itself,
/// so a drain is never limited by the handle's outbound buffer and backlog
/// frames reach the wire before any command reply.
pub trait BacklogSink {
    fn deliver(
        &mut self,
        frame: ServerFrame,
    ) -> impl Future<Output = Result<(), PushFailed>> + Send;
}

/// Routes messages to a live connection or the durable pending queue.
///
/// Every message is persisted before any push. A push that fails after
/// persistence demotes the row back to pending so the message is retried
/// on the receiver's next connect; the sender still gets a receipt.
#[derive(Clone)]
pub struct DeliveryEngine {
    store: RelayStore,
    registry: ConnectionRegistry,
}

impl DeliveryEngine {
    pub fn new(store: RelayStore, registry: ConnectionRegistry) -> Self {
        Self { store, registry }
    }

    /// Accept a message from `sender` to `receiver` and deliver or queue it.
    ///
    /// The receiver must be a registered identity. The sender is taken on
    /// trust here; the gateway binds it to the connection's authenticated
    /// identity before calling in.
    pub async fn send(
        &self,
        sender: &str,
        receiver: &str,
        body: &str,
    ) -> EngineResult<DeliveryReceipt> {
        let sender = sender.trim();
        let receiver = receiver.trim();
        if sender.is_empty() {
            return Err(EngineError::Validation("sender is required".to_string()));
        }
        if receiver.is_empty() {
            return Err(EngineError::Validation("receiver is required".to_string()));
        }
        if body.is_empty() {
            return Err(EngineError::Validation("body is required".to_string()));
        }

        if !self.store.user_exists(receiver).await? {
            return Err(EngineError::NotFound(format!(
                "unknown receiver: {receiver}"
            )));
        }

        // Snapshot the receiver's connection before persisting so the row is
        // written with the status we are about to attempt.
        let live = self.registry.lookup(receiver).await;
        let status = if live.is_some() {
            MessageStatus::Delivered
        } else {
            MessageStatus::Pending
        };

        let record = self
            .store
            .insert_message(sender, receiver, body, status)
            .await?;
        let message_id = record.id;

        if let Some(handle) = live {
            if let Err(err) = handle.push(ServerFrame::message(record)) {
                // The connection is gone or backed up. Demote to pending so
                // the backlog drain picks it up on the next connect.
                debug!(message_id, receiver = %receiver, %err, "Push failed, demoting to pending");
                if let Err(store_err) = self
                    .store
                    .update_message_status(message_id, MessageStatus::Pending)
                    .await
                {
                    warn!(message_id, error = %store_err, "Failed to demote message to pending");
                }
                return Ok(DeliveryReceipt {
                    message_id,
                    status: MessageStatus::Pending,
                });
            }
        }

        Ok(DeliveryReceipt { message_id, status })
    }

    /// Deliver `identity`'s pending backlog, oldest first, into `sink`.
    ///
    /// Each message is marked delivered only after its delivery succeeds; a
    /// failed delivery stops the drain and leaves the rest pending. Returns
    /// the number of messages delivered.
    pub async fn drain_backlog<S: BacklogSink>(
        &self,
        identity: &str,
        sink: &mut S,
    ) -> EngineResult<usize> {
        let pending = self.store.list_pending(identity).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        debug!(identity = %identity, count = pending.len(), "Draining pending backlog");
        let mut delivered = 0;
        for record in pending {
            let message_id = record.id;
            if sink.deliver(ServerFrame::message(record)).await.is_err() {
                debug!(identity = %identity, message_id, "Connection gone, stopping drain");
                break;
            }
            self.store
                .update_message_status(message_id, MessageStatus::Delivered)
                .await?;
            delivered += 1;
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_registry::{ConnectionEvent, ConnectionHandle};
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn setup() -> (DeliveryEngine, RelayStore, ConnectionRegistry) {
        let store = RelayStore::open_in_memory().await.unwrap();
        store.insert_user("alice").await.unwrap();
        store.insert_user("bob").await.unwrap();
        let registry = ConnectionRegistry::new();
        let engine = DeliveryEngine::new(store.clone(), registry.clone());
        (engine, store, registry)
    }

    async fn connect(
        registry: &ConnectionRegistry,
        identity: &str,
    ) -> (ConnectionHandle, mpsc::Receiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = ConnectionHandle::new(registry.next_connection_id(), identity, tx);
        registry.register(handle.clone()).await;
        (handle, rx)
    }

    fn expect_message(event: ConnectionEvent) -> relay_protocol_types::MessageRecord {
        match event {
            ConnectionEvent::Frame(ServerFrame::Message(record)) => record,
            other => panic!("expected message frame, got {:?}", other),
        }
    }

    /// Collects delivered frames; optionally fails after `fail_after`
    /// successful deliveries.
    struct VecSink {
        frames: Vec<ServerFrame>,
        fail_after: Option<usize>,
    }

    impl VecSink {
        fn new() -> Self {
            Self {
                frames: Vec::new(),
                fail_after: None,
            }
        }

        fn failing_after(count: usize) -> Self {
            Self {
                frames: Vec::new(),
                fail_after: Some(count),
            }
        }

        fn bodies(&self) -> Vec<&str> {
            self.frames
                .iter()
                .map(|frame| match frame {
                    ServerFrame::Message(record) => record.body.as_str(),
                    other => panic!("expected message frame, got {:?}", other),
                })
                .collect()
        }
    }

    impl BacklogSink for VecSink {
        async fn deliver(&mut self, frame: ServerFrame) -> Result<(), PushFailed> {
            if self.fail_after == Some(self.frames.len()) {
                return Err(PushFailed(0));
            }
            self.frames.push(frame);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_validation_rejects_without_persisting() {
        let (engine, store, _registry) = setup().await;

        assert!(matches!(
            engine.send("", "bob", "hi").await,
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            engine.send("alice", "  ", "hi").await,
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            engine.send("alice", "bob", "").await,
            Err(EngineError::Validation(_))
        ));

        assert!(store.list_pending("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_receiver_rejected() {
        let (engine, store, _registry) = setup().await;

        assert!(matches!(
            engine.send("alice", "carol", "hi").await,
            Err(EngineError::NotFound(_))
        ));
        assert!(store.list_pending("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_receiver_queues_pending() {
        let (engine, store, _registry) = setup().await;

        let receipt = engine.send("alice", "bob", "hi bob").await.unwrap();
        assert_eq!(receipt.status, MessageStatus::Pending);

        let pending = store.list_pending("bob").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, receipt.message_id);
        assert_eq!(pending[0].body, "hi bob");
    }

    #[tokio::test]
    async fn test_online_receiver_gets_immediate_push() {
        let (engine, store, registry) = setup().await;
        let (_handle, mut rx) = connect(&registry, "bob").await;

        let receipt = engine.send("alice", "bob", "hi").await.unwrap();
        assert_eq!(receipt.status, MessageStatus::Delivered);

        let record = expect_message(rx.recv().await.unwrap());
        assert_eq!(record.id, receipt.message_id);
        assert_eq!(record.sender, "alice");
        assert_eq!(record.status, MessageStatus::Delivered);

        // Nothing left in the pending queue
        assert!(store.list_pending("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_failure_demotes_to_pending() {
        let (engine, store, registry) = setup().await;
        let (_handle, rx) = connect(&registry, "bob").await;
        // The connection task is gone but the registry entry lingers.
        drop(rx);

        let receipt = engine.send("alice", "bob", "hi").await.unwrap();
        assert_eq!(receipt.status, MessageStatus::Pending);

        let pending = store.list_pending("bob").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, receipt.message_id);
    }

    #[tokio::test]
    async fn test_full_outbound_buffer_demotes_without_blocking() {
        let (engine, store, registry) = setup().await;
        let (handle, _rx) = connect(&registry, "bob").await;

        // Fill the outbound buffer; the receiving task never drains it.
        for n in 0..16 {
            handle.push(ServerFrame::error(format!("filler {n}"))).unwrap();
        }
        assert!(handle.push(ServerFrame::error("overflow")).is_err());

        // The send must return promptly with a pending receipt, not wait
        // for buffer space that may never open up.
        let receipt = tokio::time::timeout(
            Duration::from_secs(1),
            engine.send("alice", "bob", "hi"),
        )
        .await
        .expect("send must not block on a full outbound buffer")
        .unwrap();

        assert_eq!(receipt.status, MessageStatus::Pending);
        let pending = store.list_pending("bob").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, receipt.message_id);
    }

    #[tokio::test]
    async fn test_drain_delivers_backlog_in_order() {
        let (engine, store, _registry) = setup().await;

        engine.send("alice", "bob", "first").await.unwrap();
        engine.send("alice", "bob", "second").await.unwrap();
        engine.send("alice", "bob", "third").await.unwrap();

        let mut sink = VecSink::new();
        let delivered = engine.drain_backlog("bob", &mut sink).await.unwrap();
        assert_eq!(delivered, 3);
        assert_eq!(sink.bodies(), vec!["first", "second", "third"]);

        // Drained exactly once
        assert!(store.list_pending("bob").await.unwrap().is_empty());
        let mut again = VecSink::new();
        assert_eq!(engine.drain_backlog("bob", &mut again).await.unwrap(), 0);
        assert!(again.frames.is_empty());
    }

    #[tokio::test]
    async fn test_drain_stops_at_first_failed_delivery() {
        let (engine, store, _registry) = setup().await;

        engine.send("alice", "bob", "one").await.unwrap();
        engine.send("alice", "bob", "two").await.unwrap();

        let mut sink = VecSink::failing_after(1);
        let delivered = engine.drain_backlog("bob", &mut sink).await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(sink.bodies(), vec!["one"]);

        // The undelivered message stays pending for the next connect
        let pending = store.list_pending("bob").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].body, "two");
    }
}
