//! Structured Logging
//!
//! `tracing` is used throughout the crate with these targets:
//! - `reserve::rpc` - node requests and errors
//! - `reserve::mempool` - watcher lifecycle and skipped samples
//! - `reserve::ownership` - binding construction and signature checks
//! - `reserve::self_send` - tracking sessions and their results
//!
//! Lifecycle events that downstream services aggregate on are additionally
//! emitted as one-line JSON [`LogEvent`]s.
//!
//! # Usage
//!
//! ```rust,no_run
//! use reserve_proof::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true).unwrap();
//! tracing::info!(target: "reserve::self_send", address = "bcrt1q...", "tracking started");
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::self_send::SelfSendResult;
use crate::signature::SignatureError;

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Ownership proof checks
    Verification,
    /// Self-send tracking sessions
    SelfSend,
    /// Startup and shutdown
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (RFC 3339)
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    /// Tracking id or request id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for failed events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Event Helpers
// ============================================================================

/// Log the outcome of an ownership signature check
pub fn log_verification_event(btc_address: &str, valid: bool, error: Option<&SignatureError>) {
    let level = if valid { LogLevel::Info } else { LogLevel::Warn };
    let mut event = LogEvent::new(level, EventCategory::Verification, "signature_verification")
        .with_data(serde_json::json!({
            "btc_address": btc_address,
            "valid": valid,
        }));

    if let Some(err) = error {
        event = event.with_error(err.code(), err.to_string());
    }

    if valid {
        tracing::info!(target: "reserve::ownership", "{}", event.to_json());
    } else {
        tracing::warn!(target: "reserve::ownership", "{}", event.to_json());
    }
}

/// Log a self-send session update
pub fn log_self_send_event(event_type: &str, tracking_id: &str, address: &str, result: &SelfSendResult) {
    let failed = result.error.is_some();
    let level = if failed { LogLevel::Warn } else { LogLevel::Info };

    let mut event = LogEvent::new(level, EventCategory::SelfSend, event_type)
        .with_correlation_id(tracking_id)
        .with_data(serde_json::json!({
            "address": address,
            "status": result.status,
            "txid": result.txid,
            "confirmations": result.confirmations,
        }));

    if let Some(err) = &result.error {
        event = event.with_error("SELF_SEND_INVALID", err.as_str());
    }

    if failed {
        tracing::warn!(target: "reserve::self_send", "{}", event.to_json());
    } else {
        tracing::info!(target: "reserve::self_send", "{}", event.to_json());
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the global subscriber
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "reserve={},reserve_proof={}",
            level.as_filter(),
            level.as_filter()
        ))
    });

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from [`ReserveConfig`](crate::config::ReserveConfig)
///
/// JSON output is forced on mainnet.
pub fn init_from_config(config: &crate::config::ReserveConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from(config.log_level.as_str());
    let json_format = config.log_json || config.network == crate::config::Network::Mainnet;

    init_logging(level, json_format)
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}
