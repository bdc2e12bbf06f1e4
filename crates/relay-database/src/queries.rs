//! Query helpers operating on a raw SQLite connection.
//!
//! These run inside the store's dedicated executor thread; keep them to
//! SQL and lightweight row mapping only.

use crate::models::{parse_datetime, User};
use crate::DatabaseResult;
use chrono::Utc;
use relay_protocol_types::{MessageRecord, MessageStatus};
use rusqlite::{params, Connection};

// ==========================================
// Users (identity directory)
// ==========================================

/// Register an identity. Idempotent: registering an existing identity
/// returns the existing row.
pub fn insert_user(conn: &Connection, identity: &str) -> DatabaseResult<User> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO users (identity, created_at) VALUES (?1, ?2)",
        params![identity, now],
    )?;
    get_user(conn, identity)?.ok_or_else(|| {
        crate::DatabaseError::NotFound("User not found after insert".to_string())
    })
}

/// Get a user by identity.
pub fn get_user(conn: &Connection, identity: &str) -> DatabaseResult<Option<User>> {
    let mut stmt =
        conn.prepare("SELECT id, identity, created_at FROM users WHERE identity = ?1")?;

    let result = stmt.query_row(params![identity], |row| {
        Ok(User {
            id: row.get(0)?,
            identity: row.get(1)?,
            created_at: parse_datetime(row.get::<_, String>(2)?),
        })
    });

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Check whether an identity is registered.
pub fn user_exists(conn: &Connection, identity: &str) -> DatabaseResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE identity = ?1",
        params![identity],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// List all registered users.
pub fn list_users(conn: &Connection) -> DatabaseResult<Vec<User>> {
    let mut stmt = conn.prepare("SELECT id, identity, created_at FROM users ORDER BY id ASC")?;

    let users = stmt
        .query_map([], |row| {
            Ok(User {
                id: row.get(0)?,
                identity: row.get(1)?,
                created_at: parse_datetime(row.get::<_, String>(2)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(users)
}

// ==========================================
// Messages
// ==========================================

/// Insert a new message with the given initial status.
///
/// Returns the full stored record; the id is store-assigned and
/// monotonically increasing.
pub fn insert_message(
    conn: &Connection,
    sender: &str,
    receiver: &str,
    body: &str,
    status: MessageStatus,
) -> DatabaseResult<MessageRecord> {
    let timestamp = Utc::now();
    conn.execute(
        "INSERT INTO messages (sender, receiver, body, timestamp, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            sender,
            receiver,
            body,
            timestamp.to_rfc3339(),
            status.as_str()
        ],
    )?;

    Ok(MessageRecord {
        id: conn.last_insert_rowid(),
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        body: body.to_string(),
        timestamp,
        status,
    })
}

/// Get a message by id.
pub fn get_message(conn: &Connection, id: i64) -> DatabaseResult<Option<MessageRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender, receiver, body, timestamp, status
         FROM messages WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id], map_message_row);

    match result {
        Ok(msg) => Ok(Some(msg)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Update a message's status. Returns false when the id is unknown.
pub fn update_message_status(
    conn: &Connection,
    id: i64,
    status: MessageStatus,
) -> DatabaseResult<bool> {
    let count = conn.execute(
        "UPDATE messages SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

/// List a receiver's pending messages in creation order (id ascending).
pub fn list_pending(conn: &Connection, receiver: &str) -> DatabaseResult<Vec<MessageRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender, receiver, body, timestamp, status
         FROM messages WHERE receiver = ?1 AND status = 'pending'
         ORDER BY id ASC",
    )?;

    let messages = stmt
        .query_map(params![receiver], map_message_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(messages)
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        sender: row.get(1)?,
        receiver: row.get(2)?,
        body: row.get(3)?,
        timestamp: parse_datetime(row.get::<_, String>(4)?),
        status: MessageStatus::from_str(&row.get::<_, String>(5)?),
    })
}
