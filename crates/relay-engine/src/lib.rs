//! The delivery engine: routes each send to an immediate push or the
//! durable pending queue, and drains the backlog when a receiver connects.

mod engine;
mod error;

pub use engine::{BacklogSink, DeliveryEngine, DeliveryReceipt};
pub use error::{EngineError, EngineResult};
