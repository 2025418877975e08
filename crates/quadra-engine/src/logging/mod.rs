//! Logger setup.
//!
//! Everything in the crate logs through the `log` facade; `env_logger` is
//! installed here, once, early in `main`.

mod init;

pub use init::{init_logging, LoggingConfig, DEFAULT_FILTER};
