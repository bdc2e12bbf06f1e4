//! Engine error types.

use relay_database::DatabaseError;
use thiserror::Error;

/// Delivery engine error type.
///
/// Transport failures on a live push are handled inside the engine by
/// demoting the message to pending; they never surface here.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Missing or malformed send fields; nothing was persisted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Receiver identity is not registered; nothing was persisted.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Durability layer failure; the message is not considered sent.
    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
