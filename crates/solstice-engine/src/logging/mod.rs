//! Logging utilities.
//!
//! Centralizes logger initialization for both the server process and the
//! render worker thread. Backend is `env_logger` behind the `log` facade.

mod init;

pub use init::{init_logging, LoggingConfig};
