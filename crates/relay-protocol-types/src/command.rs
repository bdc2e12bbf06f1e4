//! Inbound commands sent by a connected client.

use serde::{Deserialize, Serialize};

/// Recognized command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Send,
}

/// A command frame decoded from a client's text message.
///
/// Field presence is validated by the delivery engine, not by serde, so a
/// frame with a missing `receiver` or `body` parses fine and then fails with
/// a validation error rather than a format error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCommand {
    /// Shared-secret token; required only when the server has one configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub cmd: CommandKind,
    /// Claimed sender. Cross-checked against the connection's authenticated
    /// identity, never trusted on its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ClientCommand {
    /// Create a `send` command.
    pub fn send(receiver: &str, body: &str) -> Self {
        Self {
            auth_token: None,
            cmd: CommandKind::Send,
            sender: None,
            receiver: Some(receiver.to_string()),
            body: Some(body.to_string()),
        }
    }

    /// Set the auth token.
    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
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
