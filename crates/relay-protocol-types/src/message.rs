//! The stored message record and its delivery status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery status of a message.
///
/// A message is created `pending` when the receiver is offline and
/// `delivered` when it was handed to a live connection. The only reverse
/// transition is the push-failure demotion back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Delivered,
}

impl Default for MessageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "delivered" => Self::Delivered,
            _ => Self::Pending,
        }
    }
}

/// A message as stored by the relay.
///
/// This is also the exact shape pushed to a receiver's connection, both for
/// live delivery and for backlog frames on connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Store-assigned id, monotonically increasing.
    pub id: i64,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(MessageStatus::Pending.as_str(), "pending");
        assert_eq!(MessageStatus::Delivered.as_str(), "delivered");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(MessageStatus::from_str("delivered"), MessageStatus::Delivered);
        assert_eq!(MessageStatus::from_str("pending"), MessageStatus::Pending);
        assert_eq!(MessageStatus::from_str("DELIVERED"), MessageStatus::Delivered);
        // Unknown values fall back to pending
        assert_eq!(MessageStatus::from_str("garbage"), MessageStatus::Pending);
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&MessageStatus::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");

        let status: MessageStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, MessageStatus::Pending);
    }

    #[test]
    fn test_message_record_serialize() {
        let record = MessageRecord {
            id: 7,
            sender: "bob".to_string(),
            receiver: "alice".to_string(),
            body: "hi".to_string(),
            timestamp: Utc::now(),
            status: MessageStatus::Delivered,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"id\":7"));
        assert!(json.contains("\"sender\":\"bob\""));
        assert!(json.contains("\"receiver\":\"alice\""));
        assert!(json.contains("\"body\":\"hi\""));
        assert!(json.contains("\"status\":\"delivered\""));
    }
}
