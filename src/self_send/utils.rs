//! Self-Send Helpers
//!
//! Pure functions shared by the tracker and its callers.

use std::time::Duration;

use super::types::{RequestValidation, SelfSendRequest};
use crate::ownership::is_bech32_address;

/// Smallest accepted self-send amount (just above the dust limit)
pub const MIN_SELF_SEND_SATS: u64 = 600;

/// Largest accepted self-send amount (0.01 BTC)
pub const MAX_SELF_SEND_SATS: u64 = 1_000_000;

pub const MAX_MIN_CONFIRMATIONS: u32 = 100;

pub const MIN_TRACKING_TIMEOUT_MS: u64 = 60_000;
pub const MAX_TRACKING_TIMEOUT_MS: u64 = 3_600_000;

/// Default session lifetime (30 minutes)
pub const DEFAULT_TRACKING_TIMEOUT: Duration = Duration::from_millis(1_800_000);

const AVERAGE_BLOCK_TIME_MS: u64 = 10 * 60 * 1000;

/// Expected wait for `confirmations` blocks, in milliseconds
pub fn estimate_confirmation_time(confirmations: u32) -> u64 {
    confirmations as u64 * AVERAGE_BLOCK_TIME_MS
}

/// Check a request before any tracking starts
pub fn validate_self_send_request(request: &SelfSendRequest) -> RequestValidation {
    if request.address.trim().is_empty() {
        return RequestValidation::rejected("Address is required");
    }

    if !is_bech32_address(&request.address) {
        return RequestValidation::rejected("Invalid Bitcoin address format");
    }

    if request.min_confirmations > MAX_MIN_CONFIRMATIONS {
        return RequestValidation::rejected(format!(
            "minConfirmations must be between 0 and {}",
            MAX_MIN_CONFIRMATIONS
        ));
    }

    if let Some(timeout_ms) = request.timeout_ms {
        if !(MIN_TRACKING_TIMEOUT_MS..=MAX_TRACKING_TIMEOUT_MS).contains(&timeout_ms) {
            return RequestValidation::rejected(format!(
                "timeoutMs must be between {} and {}",
                MIN_TRACKING_TIMEOUT_MS, MAX_TRACKING_TIMEOUT_MS
            ));
        }
    }

    RequestValidation::ok()
}
