//! Common Infrastructure
//!
//! The crate-wide error type plus re-exports of configuration and logging
//! for the binary.

pub mod error;

pub use crate::config::{ConfigError, Network, ReserveConfig};
pub use crate::logging::{init_from_config, init_logging, LogLevel, LoggingError};
pub use error::{ReserveError, Result};
