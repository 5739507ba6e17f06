//! Signature Verifier
//!
//! - **verifier**: the user-facing gate sequence and result type
//! - **bip322**: BIP-322 simple signature construction and checking

pub mod bip322;
pub mod verifier;

pub use bip322::{sign_simple, verify_simple, Bip322Error};
pub use verifier::{
    check_signature, decode_signature, verify_signature, SignatureError, VerificationResult,
    VerifySignatureRequest,
};
