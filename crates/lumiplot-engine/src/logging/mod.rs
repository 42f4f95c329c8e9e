//! Logging setup.
//!
//! The crate logs through the `log` facade only. Binaries pick the backend;
//! `init_logging` wires up `env_logger`.

mod init;

pub use init::{DEFAULT_FILTER, LoggingConfig, init_logging};
