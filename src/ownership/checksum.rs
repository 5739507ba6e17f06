//! Binding Checksum
//!
//! `checksum = TaggedHash("ReserveBTC/binding", evm(20) || program(32) || salt(32))`
//! using BIP-340 style tagged SHA-256. Pure and deterministic; any input of
//! the wrong size is a hard error.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Tag for the binding checksum
pub const CHECKSUM_TAG: &str = "ReserveBTC/binding";

pub const EVM_ADDRESS_LEN: usize = 20;
pub const WITNESS_PROGRAM_LEN: usize = 32;
pub const SALT_LEN: usize = 32;

/// Checksum input size violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LengthError {
    #[error("EVM address must be 20 bytes, got {0}")]
    EvmAddress(usize),

    #[error("EVM address is not valid hex: {0}")]
    EvmAddressEncoding(String),

    #[error("witness program must be 32 bytes, got {0}")]
    WitnessProgram(usize),

    #[error("salt must be 32 bytes, got {0}")]
    Salt(usize),
}

/// SHA256(SHA256(tag) || SHA256(tag) || data...)
pub(crate) fn tagged_hash(tag: &str, chunks: &[&[u8]]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());

    let mut hasher = Sha256::new();
    hasher.update(&tag_hash);
    hasher.update(&tag_hash);
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

/// Decode a hex EVM address, with or without `0x`
pub fn parse_evm_address(evm_address: &str) -> Result<[u8; EVM_ADDRESS_LEN], LengthError> {
    let stripped = strip_hex_prefix(evm_address);
    let bytes =
        hex::decode(stripped).map_err(|e| LengthError::EvmAddressEncoding(e.to_string()))?;

    <[u8; EVM_ADDRESS_LEN]>::try_from(bytes.as_slice())
        .map_err(|_| LengthError::EvmAddress(bytes.len()))
}

/// Checksum binding an EVM address, a witness program and a salt
pub fn calculate_checksum(
    evm_address: &str,
    btc_witness_program: &[u8],
    vrf_salt: &[u8],
) -> Result<[u8; 32], LengthError> {
    let evm = parse_evm_address(evm_address)?;

    if btc_witness_program.len() != WITNESS_PROGRAM_LEN {
        return Err(LengthError::WitnessProgram(btc_witness_program.len()));
    }
    if vrf_salt.len() != SALT_LEN {
        return Err(LengthError::Salt(vrf_salt.len()));
    }

    Ok(tagged_hash(CHECKSUM_TAG, &[&evm, btc_witness_program, vrf_salt]))
}

/// Lowercase hex, optionally `0x`-prefixed
pub fn checksum_hex(checksum: &[u8; 32], prefixed: bool) -> String {
    if prefixed {
        format!("0x{}", hex::encode(checksum))
    } else {
        hex::encode(checksum)
    }
}

/// Fresh random salt
pub fn random_salt() -> [u8; SALT_LEN] {
    rand::random()
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVM: &str = "0x1234567890abcdef1234567890abcdef12345678";

    #[test]
    fn test_checksum_is_32_bytes_and_deterministic() {
        let program = [7u8; 32];
        let salt = [9u8; 32];

        let a = calculate_checksum(EVM, &program, &salt).unwrap();
        let b = calculate_checksum(EVM, &program, &salt).unwrap();
        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
    }

    #[test]
    fn test_prefix_is_ignored() {
        let program = [1u8; 32];
        let salt = [2u8; 32];

        let with_prefix = calculate_checksum(EVM, &program, &salt).unwrap();
        let without_prefix = calculate_checksum(&EVM[2..], &program, &salt).unwrap();
        assert_eq!(with_prefix, without_prefix);
    }

    #[test]
    fn test_single_byte_changes_checksum() {
        let program = [1u8; 32];
        let salt = [2u8; 32];
        let base = calculate_checksum(EVM, &program, &salt).unwrap();

        let mut other_program = program;
        other_program[31] ^= 0x01;
        assert_ne!(base, calculate_checksum(EVM, &other_program, &salt).unwrap());

        let mut other_salt = salt;
        other_salt[0] ^= 0x80;
        assert_ne!(base, calculate_checksum(EVM, &program, &other_salt).unwrap());

        let other_evm = "0x1234567890abcdef1234567890abcdef12345679";
        assert_ne!(base, calculate_checksum(other_evm, &program, &salt).unwrap());
    }

    #[test]
    fn test_length_violations() {
        let program = [0u8; 32];
        let salt = [0u8; 32];

        assert_eq!(
            calculate_checksum("0x1234", &program, &salt),
            Err(LengthError::EvmAddress(2))
        );
        assert_eq!(
            calculate_checksum(EVM, &program[..20], &salt),
            Err(LengthError::WitnessProgram(20))
        );
        assert_eq!(
            calculate_checksum(EVM, &program, &[0u8; 33]),
            Err(LengthError::Salt(33))
        );
        assert!(matches!(
            calculate_checksum("0xnothex", &program, &salt),
            Err(LengthError::EvmAddressEncoding(_))
        ));
    }

    #[test]
    fn test_checksum_hex_rendering() {
        let checksum = [0xabu8; 32];
        assert_eq!(checksum_hex(&checksum, false), "ab".repeat(32));
        assert_eq!(checksum_hex(&checksum, true), format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn test_random_salts_differ() {
        assert_ne!(random_salt(), random_salt());
    }
}
