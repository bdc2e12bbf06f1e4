//! SQLite persistence for the relay: the durable message store and the
//! identity directory.
//!
//! This crate provides:
//! - An async store backed by a single dedicated SQLite thread
//! - Database migrations
//! - Query helpers operating on a raw connection
//!
//! All SQLite work goes through `tokio-rusqlite`'s dedicated thread, so
//! writes are atomic per row and execute in FIFO order. Callers await
//! results without blocking the Tokio runtime.

mod error;
mod migrations;
mod models;
pub mod queries;
mod store;

pub use error::{DatabaseError, DatabaseResult};
pub use migrations::run_migrations;
pub use models::User;
pub use store::RelayStore;

// The stored message shape is shared with the wire protocol.
pub use relay_protocol_types::{MessageRecord, MessageStatus};
