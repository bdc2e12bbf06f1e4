//! In-memory connection registry: the single source of truth for which
//! identities are online right now.
//!
//! Every other component treats a registry answer as momentarily
//! authoritative but never caches it; the registry is consulted fresh on
//! every send.

mod handle;
mod registry;

pub use handle::{ConnectionEvent, ConnectionHandle, PushFailed};
pub use registry::ConnectionRegistry;
