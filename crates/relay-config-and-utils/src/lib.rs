//! Configuration, paths, and logging for the relay daemon.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_HTTP_PORT, DEFAULT_LOG_LEVEL, DEFAULT_WS_PORT};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
