//! Self-Send Liveness Proofs
//!
//! A user proves control of an address by sending a small amount from it
//! back to itself. This module checks such transactions and tracks them
//! until they confirm.
//!
//! ## Components
//!
//! - **types**: request, result and status types
//! - **utils**: request validation and time estimates
//! - **verify**: structural rules for a single transaction
//! - **tracker**: per-request sessions driven by the mempool watcher

pub mod tracker;
pub mod types;
pub mod utils;
pub mod verify;

pub use tracker::{SelfSendTracker, TrackerConfig, TrackerError, TrackingHandle};
pub use types::{RequestValidation, SelfSendRequest, SelfSendResult, SelfSendStatus, TrackingId};
pub use utils::{
    estimate_confirmation_time, validate_self_send_request, DEFAULT_TRACKING_TIMEOUT,
    MAX_SELF_SEND_SATS, MIN_SELF_SEND_SATS,
};
pub use verify::{check_self_send, status_for, verify_self_send, SelfSendCandidate, SelfSendCheckError};
