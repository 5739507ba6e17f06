//! Ownership Message Codec
//!
//! Builds the binding message a user signs to prove control of a Bitcoin
//! address for a given EVM address:
//!
//! ```text
//! btc address ──► witness program (32 bytes) ─┐
//! evm address ────────────────────────────────┼──► checksum ──► binding message
//! random salt (32 bytes) ─────────────────────┘
//! ```
//!
//! `calculate_checksum` and `address_to_witness_program` return errors on
//! contract violations; they indicate integration bugs, not user input
//! problems.

pub mod checksum;
pub mod message;
pub mod witness;

use thiserror::Error;
use tracing::debug;

pub use checksum::{
    calculate_checksum, checksum_hex, parse_evm_address, random_salt, LengthError, CHECKSUM_TAG,
};
pub use message::{create_ownership_message, BINDING_DOMAIN};
pub use witness::{address_to_witness_program, is_bech32_address, UnsupportedAddressError};

/// Errors raised while assembling a binding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    #[error(transparent)]
    Length(#[from] LengthError),

    #[error(transparent)]
    UnsupportedAddress(#[from] UnsupportedAddressError),
}

/// Everything derived for one binding request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipBinding {
    pub witness_program: [u8; 32],
    pub checksum: [u8; 32],
    pub message: String,
}

impl OwnershipBinding {
    /// Derive witness program and checksum, then render the message
    ///
    /// The checksum is rendered `0x`-prefixed in the message.
    pub fn build(
        evm_address: &str,
        btc_address: &str,
        salt: &[u8],
        nonce: &str,
        height: u64,
    ) -> Result<Self, OwnershipError> {
        let witness_program = address_to_witness_program(btc_address)?;
        let checksum = calculate_checksum(evm_address, &witness_program, salt)?;
        let message = create_ownership_message(
            evm_address,
            btc_address,
            &checksum_hex(&checksum, true),
            nonce,
            height,
        );

        debug!(target: "reserve::ownership", btc_address, height, "binding message built");

        Ok(Self {
            witness_program,
            checksum,
            message,
        })
    }
}
