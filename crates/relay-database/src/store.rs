//! The async relay store.
//!
//! Wraps a single dedicated SQLite thread (via `tokio-rusqlite`): queries
//! are sent through a channel and execute in FIFO order, so row updates are
//! atomic and callers never block the Tokio runtime.

use crate::{migrations, queries, DatabaseError, DatabaseResult, User};
use relay_protocol_types::{MessageRecord, MessageStatus};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// Convert a tokio_rusqlite::Error to DatabaseError.
fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> DatabaseError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => DatabaseError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => {
            DatabaseError::Connection("Connection closed".to_string())
        }
        other => DatabaseError::Connection(other.to_string()),
    }
}

/// Durable message store and identity directory.
///
/// Cheap to clone; all clones share the one executor thread.
#[derive(Clone)]
pub struct RelayStore {
    conn: Connection,
}

impl RelayStore {
    /// Open a store at the given path.
    ///
    /// Creates the file if needed, enables WAL mode, and runs migrations.
    pub async fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Opening relay store");

        let conn = Connection::open(path)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let store = Self { conn };
        store
            .call(|conn| {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode = WAL;
                    PRAGMA synchronous = NORMAL;
                    PRAGMA foreign_keys = ON;
                    PRAGMA busy_timeout = 5000;
                    ",
                )?;
                migrations::run_migrations(conn)
            })
            .await?;

        info!(path = %path.display(), "Relay store initialized with WAL mode");
        Ok(store)
    }

    /// Open an in-memory store for testing.
    pub async fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let store = Self { conn };
        store
            .call(|conn| {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                migrations::run_migrations(conn)
            })
            .await?;
        Ok(store)
    }

    /// Execute a closure on the dedicated SQLite thread.
    ///
    /// Keep the closure to SQL and row mapping; anything heavier starves
    /// every other query behind it.
    async fn call<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let outer = self.conn.call(move |conn| Ok(f(conn))).await;
        match outer {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    // ==========================================
    // Identity directory
    // ==========================================

    /// Register an identity (idempotent).
    pub async fn insert_user(&self, identity: &str) -> DatabaseResult<User> {
        let identity = identity.to_string();
        self.call(move |conn| queries::insert_user(conn, &identity))
            .await
    }

    /// Check whether an identity is registered.
    pub async fn user_exists(&self, identity: &str) -> DatabaseResult<bool> {
        let identity = identity.to_string();
        self.call(move |conn| queries::user_exists(conn, &identity))
            .await
    }

    /// List all registered users.
    pub async fn list_users(&self) -> DatabaseResult<Vec<User>> {
        self.call(queries::list_users).await
    }

    // ==========================================
    // Message store
    // ==========================================

    /// Persist a message with the given initial status; returns the stored
    /// record with its assigned id.
    pub async fn insert_message(
        &self,
        sender: &str,
        receiver: &str,
        body: &str,
        status: MessageStatus,
    ) -> DatabaseResult<MessageRecord> {
        let sender = sender.to_string();
        let receiver = receiver.to_string();
        let body = body.to_string();
        self.call(move |conn| queries::insert_message(conn, &sender, &receiver, &body, status))
            .await
    }

    /// Get a message by id.
    pub async fn get_message(&self, id: i64) -> DatabaseResult<Option<MessageRecord>> {
        self.call(move |conn| queries::get_message(conn, id)).await
    }

    /// Update a message's status.
    pub async fn update_message_status(
        &self,
        id: i64,
        status: MessageStatus,
    ) -> DatabaseResult<bool> {
        self.call(move |conn| queries::update_message_status(conn, id, status))
            .await
    }

    /// List a receiver's pending backlog in creation order.
    pub async fn list_pending(&self, receiver: &str) -> DatabaseResult<Vec<MessageRecord>> {
        let receiver = receiver.to_string();
        self.call(move |conn| queries::list_pending(conn, &receiver))
            .await
    }

    /// Check store health with a trivial query.
    pub async fn health_check(&self) -> DatabaseResult<()> {
        self.call(|conn| {
            conn.execute_batch("SELECT 1")?;
            Ok(())
        })
        .await?;
        debug!("Store health check passed");
        Ok(())
    }

    /// Close the store, waiting for pending operations to finish.
    pub async fn close(self) -> DatabaseResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to close store: {:?}", e)))?;
        info!("Relay store closed");
        Ok(())
    }
}
