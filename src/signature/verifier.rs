//! Ownership Signature Verifier
//!
//! Gates run in order and the first failure wins:
//! 1. address format
//! 2. non-empty signature
//! 3. signature encoding (hex, then base64)
//! 4. BIP-322 check against message and address
//!
//! Format problems are never reported as verification failures and vice
//! versa.

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use bitcoin::address::NetworkUnchecked;
use bitcoin::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::bip322;
use crate::logging::log_verification_event;
use crate::ownership::is_bech32_address;

/// User-facing signature errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Invalid BTC address format")]
    InvalidAddress,

    #[error("Empty signature")]
    EmptySignature,

    #[error("Invalid signature format")]
    InvalidFormat,

    #[error("Signature verification failed")]
    VerificationFailed,
}

impl SignatureError {
    pub fn code(&self) -> &'static str {
        match self {
            SignatureError::InvalidAddress => "INVALID_ADDRESS",
            SignatureError::EmptySignature => "EMPTY_SIGNATURE",
            SignatureError::InvalidFormat => "INVALID_SIGNATURE_FORMAT",
            SignatureError::VerificationFailed => "VERIFICATION_FAILED",
        }
    }

    /// Encoding problems, as opposed to a failed cryptographic check
    pub fn is_format_error(&self) -> bool {
        !matches!(self, SignatureError::VerificationFailed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySignatureRequest {
    pub btc_address: String,
    pub message: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<String, SignatureError>> for VerificationResult {
    fn from(outcome: Result<String, SignatureError>) -> Self {
        match outcome {
            Ok(address) => Self {
                valid: true,
                address: Some(address),
                error: None,
            },
            Err(e) => Self {
                valid: false,
                address: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Verify an ownership signature, never failing past the result object
pub fn verify_signature(request: &VerifySignatureRequest) -> VerificationResult {
    let outcome = check_signature(request);
    log_verification_event(
        &request.btc_address,
        outcome.is_ok(),
        outcome.as_ref().err(),
    );
    outcome.into()
}

/// Gate sequence behind [`verify_signature`]; returns the address on success
pub fn check_signature(request: &VerifySignatureRequest) -> Result<String, SignatureError> {
    let address = parse_address(&request.btc_address)?;

    let signature = request.signature.trim();
    if signature.is_empty() {
        return Err(SignatureError::EmptySignature);
    }

    let witness = decode_signature(signature)?;

    bip322::verify_simple(&address, request.message.as_bytes(), &witness).map_err(|e| {
        debug!(target: "reserve::ownership", address = %request.btc_address, error = %e, "BIP-322 check failed");
        SignatureError::VerificationFailed
    })?;

    Ok(request.btc_address.clone())
}

fn parse_address(address: &str) -> Result<Address, SignatureError> {
    if !is_bech32_address(address) {
        return Err(SignatureError::InvalidAddress);
    }

    Address::<NetworkUnchecked>::from_str(address)
        .map(|address| address.assume_checked())
        .map_err(|_| SignatureError::InvalidAddress)
}

/// Hex (optionally `0x`-prefixed) is tried first, then standard base64
pub fn decode_signature(signature: &str) -> Result<Vec<u8>, SignatureError> {
    let hex_body = signature
        .strip_prefix("0x")
        .or_else(|| signature.strip_prefix("0X"))
        .unwrap_or(signature);

    if !hex_body.is_empty() && hex_body.len() % 2 == 0 && hex_body.bytes().all(|b| b.is_ascii_hexdigit()) {
        if let Ok(bytes) = hex::decode(hex_body) {
            return Ok(bytes);
        }
    }

    match STANDARD.decode(signature) {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(SignatureError::InvalidFormat),
    }
}
