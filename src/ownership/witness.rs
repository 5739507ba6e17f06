//! Witness Program Normalization
//!
//! Maps a segwit address to a fixed 32-byte form:
//! - v0 20-byte program (P2WPKH) is left-padded with 12 zero bytes
//! - 32-byte programs (P2WSH, P2TR) pass through
//!
//! Legacy, P2SH and malformed strings are rejected.

use std::str::FromStr;
use std::sync::LazyLock;

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, WitnessVersion};
use regex::Regex;
use thiserror::Error;

/// Lowercase bech32/bech32m shape for mainnet, testnet and regtest
static BECH32_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(bc1|tb1|bcrt1)[a-z0-9]{39,59}$").expect("valid address regex")
});

/// Cheap shape check, no checksum validation
pub fn is_bech32_address(address: &str) -> bool {
    BECH32_ADDRESS.is_match(address)
}

/// Address cannot be expressed as a 32-byte witness program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedAddressError {
    #[error("malformed address {address}: {reason}")]
    Malformed { address: String, reason: String },

    #[error("not a segwit address: {0}")]
    NotSegwit(String),

    #[error("unsupported witness program (version {version}, {len} bytes): {address}")]
    Program {
        address: String,
        version: u8,
        len: usize,
    },
}

/// Decode a bech32/bech32m address into its 32-byte witness program
pub fn address_to_witness_program(address: &str) -> Result<[u8; 32], UnsupportedAddressError> {
    let parsed = Address::<NetworkUnchecked>::from_str(address).map_err(|e| {
        UnsupportedAddressError::Malformed {
            address: address.to_string(),
            reason: e.to_string(),
        }
    })?;

    // Network is not checked here: bc, tb and bcrt addresses are all accepted.
    let program = parsed
        .assume_checked()
        .witness_program()
        .ok_or_else(|| UnsupportedAddressError::NotSegwit(address.to_string()))?;

    let bytes = program.program().as_bytes();
    let mut normalized = [0u8; 32];

    match (program.version(), bytes.len()) {
        (WitnessVersion::V0, 20) => normalized[12..].copy_from_slice(bytes),
        (WitnessVersion::V0 | WitnessVersion::V1, 32) => normalized.copy_from_slice(bytes),
        (version, len) => {
            return Err(UnsupportedAddressError::Program {
                address: address.to_string(),
                version: version.to_num(),
                len,
            })
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP-173 / BIP-350 test vectors
    const P2WPKH_MAINNET: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const P2WPKH_PROGRAM: &str = "751e76e8199196d454941c45d1b3a323f1433bd6";
    const P2TR_MAINNET: &str = "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0";
    const P2TR_PROGRAM: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const P2WSH_TESTNET: &str = "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7";

    #[test]
    fn test_p2wpkh_left_padded() {
        let program = address_to_witness_program(P2WPKH_MAINNET).unwrap();
        assert_eq!(&program[..12], &[0u8; 12]);
        assert_eq!(hex::encode(&program[12..]), P2WPKH_PROGRAM);
    }

    #[test]
    fn test_p2tr_passthrough() {
        let program = address_to_witness_program(P2TR_MAINNET).unwrap();
        assert_eq!(hex::encode(program), P2TR_PROGRAM);
    }

    #[test]
    fn test_p2wsh_passthrough() {
        let program = address_to_witness_program(P2WSH_TESTNET).unwrap();
        assert_eq!(
            hex::encode(program),
            "1863143c14c5166804bd19203356da136c985678cd4d27a1b8c6329604903262"
        );
    }

    #[test]
    fn test_regtest_p2wpkh() {
        let program =
            address_to_witness_program("bcrt1qw508d6qejxtdg4y5r3zarvary0c5xw7kygt080").unwrap();
        assert_eq!(hex::encode(&program[12..]), P2WPKH_PROGRAM);
    }

    #[test]
    fn test_legacy_and_p2sh_rejected() {
        assert!(matches!(
            address_to_witness_program("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"),
            Err(UnsupportedAddressError::NotSegwit(_))
        ));
        assert!(matches!(
            address_to_witness_program("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"),
            Err(UnsupportedAddressError::NotSegwit(_))
        ));
    }

    #[test]
    fn test_bech32_shape() {
        assert!(is_bech32_address(P2WPKH_MAINNET));
        assert!(is_bech32_address(P2TR_MAINNET));
        assert!(is_bech32_address(P2WSH_TESTNET));
        assert!(is_bech32_address("bcrt1qw508d6qejxtdg4y5r3zarvary0c5xw7kygt080"));

        assert!(!is_bech32_address(""));
        assert!(!is_bech32_address("invalid_address"));
        assert!(!is_bech32_address("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"));
        assert!(!is_bech32_address("BC1QW508D6QEJXTDG4Y5R3ZARVARY0C5XW7KV8F3T4"));
        assert!(!is_bech32_address("bc1qshort"));
    }

    #[test]
    fn test_garbage_rejected() {
        for input in ["", "not-an-address", "bc1qqqqqq", "invalid_address"] {
            assert!(
                matches!(
                    address_to_witness_program(input),
                    Err(UnsupportedAddressError::Malformed { .. })
                ),
                "expected rejection for {:?}",
                input
            );
        }
    }
}
