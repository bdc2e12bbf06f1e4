//! Database model types.
//!
//! The message row itself is [`relay_protocol_types::MessageRecord`], since
//! the stored record is exactly what gets pushed over the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub identity: String,
    pub created_at: DateTime<Utc>,
}

/// Parse an RFC3339 datetime string, falling back to current time on error.
pub(crate) fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
