//! BIP-322 Simple Signatures
//!
//! A simple signature is the consensus-encoded witness stack of the virtual
//! `to_sign` transaction spending the virtual `to_spend` output that pays to
//! the signing address.
//!
//! Supported scripts:
//! - P2WPKH (`[ecdsa_sig, pubkey]`)
//! - P2TR key path (`[schnorr_sig]`)
//!
//! Anything else (P2WSH, script-path spends, legacy) fails verification.

use bitcoin::hashes::Hash;
use bitcoin::key::{Keypair, TapTweak, TweakedPublicKey, XOnlyPublicKey};
use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::opcodes::OP_0;
use bitcoin::script::Builder;
use bitcoin::secp256k1::{Message, Secp256k1, SECP256K1};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::{
    absolute, consensus, ecdsa, taproot, transaction, Address, Amount, CompressedPublicKey,
    OutPoint, PrivateKey, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};
use thiserror::Error;

use crate::ownership::checksum::tagged_hash;

/// Tag for the BIP-322 message hash
pub const MESSAGE_TAG: &str = "BIP0322-signed-message";

/// Reasons a BIP-322 proof is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Bip322Error {
    #[error("unsupported script type: {0}")]
    UnsupportedScript(String),

    #[error("malformed witness: {0}")]
    MalformedWitness(String),

    #[error("public key does not match address")]
    KeyMismatch,

    #[error("sighash type {0} not allowed")]
    SighashType(String),

    #[error("sighash computation failed: {0}")]
    Sighash(String),

    #[error("signature does not verify")]
    InvalidSignature,
}

/// Tagged hash of the message bytes
pub fn message_hash(message: &[u8]) -> [u8; 32] {
    tagged_hash(MESSAGE_TAG, &[message])
}

/// The virtual transaction whose only output pays to the signing script
pub fn to_spend(script_pubkey: &Script, message: &[u8]) -> Transaction {
    let script_sig = Builder::new()
        .push_opcode(OP_0)
        .push_slice(message_hash(message))
        .into_script();

    Transaction {
        version: transaction::Version(0),
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig,
            sequence: Sequence::ZERO,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::ZERO,
            script_pubkey: script_pubkey.to_owned(),
        }],
    }
}

/// The virtual transaction spending `to_spend`, carrying `witness`
pub fn to_sign(to_spend: &Transaction, witness: Witness) -> Transaction {
    Transaction {
        version: transaction::Version(0),
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: to_spend.compute_txid(),
                vout: 0,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ZERO,
            witness,
        }],
        output: vec![TxOut {
            value: Amount::ZERO,
            script_pubkey: Builder::new().push_opcode(OP_RETURN).into_script(),
        }],
    }
}

/// Verify a simple signature (consensus-encoded witness) for `address`
pub fn verify_simple(address: &Address, message: &[u8], signature: &[u8]) -> Result<(), Bip322Error> {
    let witness: Witness = consensus::deserialize(signature)
        .map_err(|e| Bip322Error::MalformedWitness(e.to_string()))?;

    let script_pubkey = address.script_pubkey();
    let to_spend = to_spend(&script_pubkey, message);
    let to_sign = to_sign(&to_spend, witness);

    if script_pubkey.is_p2wpkh() {
        verify_p2wpkh(&to_sign, &script_pubkey)
    } else if script_pubkey.is_p2tr() {
        verify_p2tr(&to_sign, &to_spend)
    } else {
        Err(Bip322Error::UnsupportedScript(address.to_string()))
    }
}

fn verify_p2wpkh(to_sign: &Transaction, script_pubkey: &Script) -> Result<(), Bip322Error> {
    let witness = &to_sign.input[0].witness;
    if witness.len() != 2 {
        return Err(Bip322Error::MalformedWitness(format!(
            "expected 2 P2WPKH witness items, got {}",
            witness.len()
        )));
    }

    let (sig_bytes, key_bytes) = match (witness.nth(0), witness.nth(1)) {
        (Some(sig), Some(key)) => (sig, key),
        _ => return Err(Bip322Error::MalformedWitness("missing witness item".to_string())),
    };

    let sig = ecdsa::Signature::from_slice(sig_bytes)
        .map_err(|e| Bip322Error::MalformedWitness(e.to_string()))?;
    if sig.sighash_type != EcdsaSighashType::All {
        return Err(Bip322Error::SighashType(sig.sighash_type.to_string()));
    }

    let pubkey = CompressedPublicKey::from_slice(key_bytes)
        .map_err(|e| Bip322Error::MalformedWitness(e.to_string()))?;
    if ScriptBuf::new_p2wpkh(&pubkey.wpubkey_hash()) != *script_pubkey {
        return Err(Bip322Error::KeyMismatch);
    }

    let sighash = SighashCache::new(to_sign)
        .p2wpkh_signature_hash(0, script_pubkey, Amount::ZERO, sig.sighash_type)
        .map_err(|e| Bip322Error::Sighash(e.to_string()))?;
    let msg = Message::from_digest(sighash.to_byte_array());

    SECP256K1
        .verify_ecdsa(&msg, &sig.signature, &pubkey.0)
        .map_err(|_| Bip322Error::InvalidSignature)
}

fn verify_p2tr(to_sign: &Transaction, to_spend: &Transaction) -> Result<(), Bip322Error> {
    let witness = &to_sign.input[0].witness;
    let sig_bytes = match (witness.len(), witness.nth(0)) {
        (1, Some(sig)) => sig,
        (len, _) => {
            return Err(Bip322Error::MalformedWitness(format!(
                "expected 1 key-path witness item, got {}",
                len
            )))
        }
    };

    let sig = taproot::Signature::from_slice(sig_bytes)
        .map_err(|e| Bip322Error::MalformedWitness(e.to_string()))?;
    if !matches!(sig.sighash_type, TapSighashType::Default | TapSighashType::All) {
        return Err(Bip322Error::SighashType(sig.sighash_type.to_string()));
    }

    // OP_1 PUSH32 <output key>
    let output_key = XOnlyPublicKey::from_slice(&to_spend.output[0].script_pubkey.as_bytes()[2..])
        .map_err(|_| Bip322Error::KeyMismatch)?;

    let prevouts = [to_spend.output[0].clone()];
    let sighash = SighashCache::new(to_sign)
        .taproot_key_spend_signature_hash(0, &Prevouts::All(&prevouts), sig.sighash_type)
        .map_err(|e| Bip322Error::Sighash(e.to_string()))?;
    let msg = Message::from_digest(sighash.to_byte_array());

    SECP256K1
        .verify_schnorr(&sig.signature, &msg, &output_key)
        .map_err(|_| Bip322Error::InvalidSignature)
}

/// Produce a simple signature for `address` with `key`
///
/// The key must own the address: its compressed pubkey for P2WPKH, or the
/// BIP-86 tweaked output key for P2TR.
pub fn sign_simple(address: &Address, message: &[u8], key: &PrivateKey) -> Result<Vec<u8>, Bip322Error> {
    let script_pubkey = address.script_pubkey();
    let to_spend = to_spend(&script_pubkey, message);
    let to_sign = to_sign(&to_spend, Witness::new());
    let secp = Secp256k1::new();

    let witness = if script_pubkey.is_p2wpkh() {
        let pubkey = CompressedPublicKey::from_private_key(&secp, key)
            .map_err(|_| Bip322Error::KeyMismatch)?;
        if ScriptBuf::new_p2wpkh(&pubkey.wpubkey_hash()) != script_pubkey {
            return Err(Bip322Error::KeyMismatch);
        }

        let sighash = SighashCache::new(&to_sign)
            .p2wpkh_signature_hash(0, &script_pubkey, Amount::ZERO, EcdsaSighashType::All)
            .map_err(|e| Bip322Error::Sighash(e.to_string()))?;
        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = secp.sign_ecdsa(&msg, &key.inner);

        Witness::p2wpkh(&ecdsa::Signature::sighash_all(signature), &pubkey.0)
    } else if script_pubkey.is_p2tr() {
        let keypair = Keypair::from_secret_key(&secp, &key.inner);
        let tweaked = keypair.tap_tweak(&secp, None).to_inner();
        let expected = ScriptBuf::new_p2tr_tweaked(TweakedPublicKey::dangerous_assume_tweaked(
            tweaked.x_only_public_key().0,
        ));
        if expected != script_pubkey {
            return Err(Bip322Error::KeyMismatch);
        }

        let prevouts = [to_spend.output[0].clone()];
        let sighash = SighashCache::new(&to_sign)
            .taproot_key_spend_signature_hash(0, &Prevouts::All(&prevouts), TapSighashType::Default)
            .map_err(|e| Bip322Error::Sighash(e.to_string()))?;
        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = secp.sign_schnorr_no_aux_rand(&msg, &tweaked);

        Witness::p2tr_key_spend(&taproot::Signature {
            signature,
            sighash_type: TapSighashType::Default,
        })
    } else {
        return Err(Bip322Error::UnsupportedScript(address.to_string()));
    };

    Ok(consensus::serialize(&witness))
}
