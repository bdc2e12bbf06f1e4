//! Gateway error types.

use thiserror::Error;

/// Gateway error type.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Store failure surfaced by the admin API.
    #[error("Database error: {0}")]
    Database(#[from] relay_database::DatabaseError),
}

/// Result type alias using GatewayError.
pub type GatewayResult<T> = Result<T, GatewayError>;
