//! Outbound frames pushed to a client connection.

use crate::{MessageRecord, MessageStatus};
use serde::{Deserialize, Serialize};

/// Acknowledgement sent to the sender after a `send` command was accepted.
///
/// `delivery` reports the message's status at accept time: `delivered` means
/// it was handed to a live receiver connection, `pending` means it was queued
/// for the receiver's next connect. Either way the send succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAck {
    pub status: String,
    pub message_id: i64,
    pub delivery: MessageStatus,
}

/// Error frame sent for any failure category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: String,
}

/// Any frame the server writes to a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    /// A pushed message, live or drained from the backlog.
    Message(MessageRecord),
    /// Acknowledgement of an accepted send.
    Ack(SendAck),
    /// Structured error.
    Error(ErrorFrame),
}

impl ServerFrame {
    /// Create an ack frame for an accepted message.
    pub fn ack(message_id: i64, delivery: MessageStatus) -> Self {
        Self::Ack(SendAck {
            status: "sent".to_string(),
            message_id,
            delivery,
        })
    }

    /// Create an error frame.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorFrame {
            error: message.into(),
        })
    }

    /// Create a message push frame.
    pub fn message(record: MessageRecord) -> Self {
        Self::Message(record)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
