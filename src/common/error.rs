//! Common Error Types
//!
//! Each module keeps its own error enum; `ReserveError` wraps them at the
//! binary boundary.

use thiserror::Error;

use crate::config::ConfigError;
use crate::logging::LoggingError;
use crate::ownership::OwnershipError;
use crate::rpc::RpcError;
use crate::self_send::TrackerError;
use crate::signature::SignatureError;

/// Root error type
#[derive(Debug, Error)]
pub enum ReserveError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("bitcoin RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("ownership error: {0}")]
    Ownership(#[from] OwnershipError),

    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("tracking error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReserveError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Transient node failures and I/O errors may succeed on retry
    pub fn is_retryable(&self) -> bool {
        match self {
            ReserveError::Rpc(e) => e.is_transient(),
            ReserveError::Io(_) => true,
            _ => false,
        }
    }

    /// Stable code for machine-readable output
    pub fn error_code(&self) -> &'static str {
        match self {
            ReserveError::Config(_) => "CONFIG_ERROR",
            ReserveError::Logging(_) => "LOGGING_ERROR",
            ReserveError::Rpc(_) => "RPC_ERROR",
            ReserveError::Ownership(_) => "OWNERSHIP_ERROR",
            ReserveError::Signature(e) => e.code(),
            ReserveError::Tracker(_) => "TRACKER_ERROR",
            ReserveError::Validation(_) => "VALIDATION_ERROR",
            ReserveError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using ReserveError
pub type Result<T> = std::result::Result<T, ReserveError>;
