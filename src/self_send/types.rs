//! Self-Send Types

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Liveness proof status
///
/// ```text
/// (none) ──► mempool ──► pending ──► confirmed
///    │          │           │
///    └──────────┴───────────┴──► invalid | expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfSendStatus {
    /// Seen with fewer confirmations than required, but at least one
    Pending,
    /// Zero confirmations
    Mempool,
    /// Reached the confirmation target
    Confirmed,
    /// Failed a structural rule
    Invalid,
    /// Timed out before confirming
    Expired,
}

impl SelfSendStatus {
    /// No further updates follow a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SelfSendStatus::Confirmed | SelfSendStatus::Invalid | SelfSendStatus::Expired
        )
    }
}

impl fmt::Display for SelfSendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelfSendStatus::Pending => "pending",
            SelfSendStatus::Mempool => "mempool",
            SelfSendStatus::Confirmed => "confirmed",
            SelfSendStatus::Invalid => "invalid",
            SelfSendStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// Caller request to watch for a self-send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfSendRequest {
    pub address: String,
    pub min_confirmations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl SelfSendRequest {
    pub fn new(address: impl Into<String>, min_confirmations: u32) -> Self {
        Self {
            address: address.into(),
            min_confirmations,
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// One update for a tracking session, or the result of a one-off check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfSendResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: SelfSendStatus,
}

impl SelfSendResult {
    /// Structurally valid transaction at `status`
    pub fn in_flight(status: SelfSendStatus, txid: impl Into<String>, confirmations: u32) -> Self {
        Self {
            valid: true,
            txid: Some(txid.into()),
            confirmations: Some(confirmations),
            error: None,
            status,
        }
    }

    pub fn invalid(txid: Option<String>, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            txid,
            confirmations: None,
            error: Some(error.into()),
            status: SelfSendStatus::Invalid,
        }
    }

    pub fn expired() -> Self {
        Self {
            valid: false,
            txid: None,
            confirmations: None,
            error: None,
            status: SelfSendStatus::Expired,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Outcome of [`validate_self_send_request`](super::validate_self_send_request)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Tracking session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackingId(String);

impl TrackingId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!SelfSendStatus::Pending.is_terminal());
        assert!(!SelfSendStatus::Mempool.is_terminal());
        assert!(SelfSendStatus::Confirmed.is_terminal());
        assert!(SelfSendStatus::Invalid.is_terminal());
        assert!(SelfSendStatus::Expired.is_terminal());
    }

    #[test]
    fn test_result_serialization() {
        let result = SelfSendResult::in_flight(SelfSendStatus::Mempool, "ab", 0);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "mempool");
        assert_eq!(json["valid"], true);
        assert!(json.get("error").is_none());

        let expired = serde_json::to_value(SelfSendResult::expired()).unwrap();
        assert_eq!(expired, serde_json::json!({"valid": false, "status": "expired"}));
    }

    #[test]
    fn test_request_serde_names() {
        let request: SelfSendRequest =
            serde_json::from_str(r#"{"address":"bcrt1qx","minConfirmations":3}"#).unwrap();
        assert_eq!(request, SelfSendRequest::new("bcrt1qx", 3));
    }

    #[test]
    fn test_tracking_ids_unique() {
        assert_ne!(TrackingId::generate(), TrackingId::generate());
        assert_eq!(TrackingId::generate().as_str().len(), 36);
    }
}
