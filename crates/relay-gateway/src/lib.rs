//! Network listeners: the WebSocket transport clients connect to, and the
//! admin HTTP surface for identity registration.

mod admin;
mod connection;
mod error;
mod server;

pub use admin::AdminServer;
pub use error::{GatewayError, GatewayResult};
pub use server::GatewayServer;
