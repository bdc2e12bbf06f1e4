//! Wire protocol types shared between the relay gateway, engine, and store.
//!
//! All frames are JSON over the WebSocket transport:
//! - Inbound: [`ClientCommand`] (after the handshake)
//! - Outbound: [`ServerFrame`] (acks, errors, and pushed message records)

mod command;
mod frame;
mod message;

pub use command::{ClientCommand, CommandKind};
pub use frame::{ErrorFrame, SendAck, ServerFrame};
pub use message::{MessageRecord, MessageStatus};
