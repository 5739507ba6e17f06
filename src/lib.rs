//! ReserveBTC Proof Core
//!
//! Proves that a user controls a Bitcoin address, two ways:
//!
//! 1. **Ownership message** - the user signs a binding message that ties
//!    the Bitcoin address to an EVM address (BIP-322 simple signature)
//! 2. **Self-send** - the user sends a small amount from the address back
//!    to itself and the tracker follows it until it confirms
//!
//! ## Modules
//!
//! - **rpc** - Bitcoin Core JSON-RPC client
//! - **indexer** - wallet queries and the mempool watcher
//! - **ownership** - binding message, checksum, witness programs
//! - **signature** - ownership signature verification
//! - **self_send** - self-send verification and tracking

pub mod common;
pub mod config;
pub mod indexer;
pub mod logging;
pub mod ownership;
pub mod rpc;
pub mod self_send;
pub mod signature;

// Re-exports: RPC
pub use rpc::{BitcoinRpc, RpcClient, RpcConfig, RpcError};

// Re-exports: Indexer
pub use indexer::{ChainIndexer, MempoolDiff, MempoolWatch, NormalizedUtxo, WalletHistoryEntry, WatcherConfig};

// Re-exports: Ownership
pub use ownership::{
    address_to_witness_program, calculate_checksum, create_ownership_message, LengthError,
    OwnershipBinding, OwnershipError, UnsupportedAddressError,
};

// Re-exports: Signatures
pub use signature::{verify_signature, SignatureError, VerificationResult, VerifySignatureRequest};

// Re-exports: Self-send
pub use self_send::{
    estimate_confirmation_time, validate_self_send_request, verify_self_send, SelfSendRequest,
    SelfSendResult, SelfSendStatus, SelfSendTracker, TrackerConfig, TrackerError, TrackingHandle,
    TrackingId,
};

// Re-exports: Infrastructure
pub use common::{ReserveError, Result};
pub use config::ReserveConfig;

/// Satoshi conversion helpers
pub mod units {
    pub const SATS_PER_BTC: u64 = 100_000_000;

    /// Convert BTC to satoshis with proper rounding
    pub fn btc_to_sats(btc: f64) -> u64 {
        (btc * SATS_PER_BTC as f64).round() as u64
    }

    pub fn sats_to_btc(sats: u64) -> f64 {
        sats as f64 / SATS_PER_BTC as f64
    }

    pub fn format_sats(sats: u64) -> String {
        let btc = sats_to_btc(sats);
        format!("{} sats ({:.8} BTC)", sats, btc)
    }

}
