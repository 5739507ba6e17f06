//! Self-Send Verification
//!
//! A self-send spends at least one output owned by the address and pays
//! back to the same address:
//! - some input's previous output pays to the address
//! - some output pays to the address
//! - the outputs to the address sum to 600 sats - 0.01 BTC inclusive
//!
//! Input addresses come from the `prevout` attached by the node when
//! present, otherwise from the funding transaction.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use super::types::{SelfSendResult, SelfSendStatus};
use super::utils::{MAX_SELF_SEND_SATS, MIN_SELF_SEND_SATS};
use crate::rpc::{BitcoinRpc, RawTransaction, RpcError};
use crate::units::btc_to_sats;

/// Why a transaction is not an acceptable self-send
#[derive(Debug, Error)]
pub enum SelfSendCheckError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Malformed transaction: {0}")]
    Malformed(String),

    #[error("No inputs from the specified address")]
    NoInputs,

    #[error("No outputs to the specified address")]
    NoOutputs,

    #[error("Amount too small: {0} sats (minimum 600)")]
    AmountTooSmall(u64),

    #[error("Amount too large: {0} sats (maximum 1000000)")]
    AmountTooLarge(u64),
}

impl SelfSendCheckError {
    /// The transaction touches the address on both sides
    pub fn is_amount_violation(&self) -> bool {
        matches!(
            self,
            SelfSendCheckError::AmountTooSmall(_) | SelfSendCheckError::AmountTooLarge(_)
        )
    }
}

/// A transaction that passed every structural rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfSendCandidate {
    pub txid: String,
    pub amount_sats: u64,
    pub confirmations: u32,
}

impl SelfSendCandidate {
    pub fn status(&self, min_confirmations: u32) -> SelfSendStatus {
        status_for(self.confirmations, min_confirmations)
    }

    pub fn into_result(self, min_confirmations: u32) -> SelfSendResult {
        let status = self.status(min_confirmations);
        SelfSendResult::in_flight(status, self.txid, self.confirmations)
    }
}

/// Map confirmations to a status
///
/// `min_confirmations = 0` makes every observed transaction confirmed.
pub fn status_for(confirmations: u32, min_confirmations: u32) -> SelfSendStatus {
    if confirmations >= min_confirmations {
        SelfSendStatus::Confirmed
    } else if confirmations == 0 {
        SelfSendStatus::Mempool
    } else {
        SelfSendStatus::Pending
    }
}

/// Check `txid` against the self-send rules and report its status
///
/// Never fails: RPC errors and malformed payloads become `invalid` results.
pub async fn verify_self_send<R>(
    rpc: &R,
    address: &str,
    txid: &str,
    min_confirmations: u32,
) -> SelfSendResult
where
    R: BitcoinRpc + ?Sized,
{
    match check_self_send(rpc, address, txid).await {
        Ok(candidate) => candidate.into_result(min_confirmations),
        Err(e) => SelfSendResult::invalid(Some(txid.to_string()), e.to_string()),
    }
}

/// Structural check behind [`verify_self_send`]
pub async fn check_self_send<R>(
    rpc: &R,
    address: &str,
    txid: &str,
) -> Result<SelfSendCandidate, SelfSendCheckError>
where
    R: BitcoinRpc + ?Sized,
{
    let tx = rpc.get_raw_transaction(txid).await?;

    let outputs = tx
        .vout
        .as_ref()
        .ok_or_else(|| SelfSendCheckError::Malformed("missing vout".to_string()))?;
    if tx.vin.is_none() {
        return Err(SelfSendCheckError::Malformed("missing vin".to_string()));
    }

    if !spends_from(rpc, &tx, address).await? {
        return Err(SelfSendCheckError::NoInputs);
    }

    let to_address: Vec<_> = outputs
        .iter()
        .filter(|output| output.script_pub_key.address() == Some(address))
        .collect();
    if to_address.is_empty() {
        return Err(SelfSendCheckError::NoOutputs);
    }

    let amount_sats: u64 = to_address.iter().map(|output| btc_to_sats(output.value)).sum();
    if amount_sats < MIN_SELF_SEND_SATS {
        return Err(SelfSendCheckError::AmountTooSmall(amount_sats));
    }
    if amount_sats > MAX_SELF_SEND_SATS {
        return Err(SelfSendCheckError::AmountTooLarge(amount_sats));
    }

    debug!(
        target: "reserve::self_send",
        txid,
        address,
        amount_sats,
        confirmations = tx.confirmations(),
        "self-send structure valid"
    );

    Ok(SelfSendCandidate {
        txid: tx.txid.clone(),
        amount_sats,
        confirmations: tx.confirmations(),
    })
}

/// Whether any non-coinbase input spends an output paying `address`
async fn spends_from<R>(rpc: &R, tx: &RawTransaction, address: &str) -> Result<bool, SelfSendCheckError>
where
    R: BitcoinRpc + ?Sized,
{
    let inputs = tx.vin.as_deref().unwrap_or_default();
    let mut funding: HashMap<String, RawTransaction> = HashMap::new();

    for input in inputs.iter().filter(|input| !input.is_coinbase()) {
        if let Some(prevout) = &input.prevout {
            if prevout.script_pub_key.address() == Some(address) {
                return Ok(true);
            }
            continue;
        }

        let (prev_txid, prev_vout) = match (&input.txid, input.vout) {
            (Some(txid), Some(vout)) => (txid, vout),
            _ => {
                return Err(SelfSendCheckError::Malformed(
                    "input without previous outpoint".to_string(),
                ))
            }
        };

        if !funding.contains_key(prev_txid) {
            let prev = rpc.get_raw_transaction(prev_txid).await?;
            funding.insert(prev_txid.clone(), prev);
        }

        let paid_to = funding
            .get(prev_txid)
            .and_then(|prev| prev.vout.as_ref())
            .and_then(|outputs| outputs.iter().find(|output| output.n == prev_vout))
            .and_then(|output| output.script_pub_key.address());

        if paid_to == Some(address) {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::rpc::MockBitcoinRpc;
    use serde_json::{json, Value};

    pub(crate) const ADDRESS: &str = "bcrt1qw508d6qejxtdg4y5r3zarvary0c5xw7kygt080";
    pub(crate) const OTHER: &str = "bcrt1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qzf6d5x";

    pub(crate) fn txid(tag: u8) -> String {
        hex::encode([tag; 32])
    }

    pub(crate) fn funding_tx(id: &str, to: &str, value: f64) -> Value {
        json!({
            "txid": id,
            "vin": [{ "coinbase": "03a08601", "sequence": 4294967295u32 }],
            "vout": [{ "value": value, "n": 0, "scriptPubKey": { "address": to } }],
            "confirmations": 101
        })
    }

    /// One input spending `funding:0`, outputs as given
    pub(crate) fn spending_tx(id: &str, funding: &str, outputs: &[(&str, f64)], confirmations: Option<u32>) -> Value {
        let vout: Vec<Value> = outputs
            .iter()
            .enumerate()
            .map(|(n, (to, value))| json!({ "value": value, "n": n, "scriptPubKey": { "address": to } }))
            .collect();

        let mut tx = json!({
            "txid": id,
            "vin": [{ "txid": funding, "vout": 0, "sequence": 4294967293u32 }],
            "vout": vout,
        });
        if let Some(confirmations) = confirmations {
            tx["confirmations"] = json!(confirmations);
        }
        tx
    }

    /// Mock answering `getrawtransaction` from a fixed set of transactions
    pub(crate) fn chain(txs: Vec<Value>) -> MockBitcoinRpc {
        let known: HashMap<String, Value> = txs
            .into_iter()
            .map(|tx| (tx["txid"].as_str().unwrap().to_string(), tx))
            .collect();

        let mut rpc = MockBitcoinRpc::new();
        rpc.expect_get_raw_transaction().returning(move |txid| {
            known
                .get(txid)
                .map(|tx| serde_json::from_value(tx.clone()).unwrap())
                .ok_or_else(|| RpcError::Node {
                    code: -5,
                    message: "No such mempool or blockchain transaction".to_string(),
                })
        });
        rpc
    }

    fn self_send(value: f64, confirmations: Option<u32>) -> MockBitcoinRpc {
        chain(vec![
            funding_tx(&txid(1), ADDRESS, 0.5),
            spending_tx(&txid(2), &txid(1), &[(ADDRESS, value), (OTHER, 0.4)], confirmations),
        ])
    }

    #[tokio::test]
    async fn test_confirmed_self_send() {
        let rpc = self_send(0.001, Some(6));
        let result = verify_self_send(&rpc, ADDRESS, &txid(2), 3).await;

        assert!(result.valid);
        assert_eq!(result.status, SelfSendStatus::Confirmed);
        assert_eq!(result.confirmations, Some(6));
        assert_eq!(result.txid, Some(txid(2)));
    }

    #[tokio::test]
    async fn test_candidate_amount_counts_only_address_outputs() {
        let rpc = chain(vec![
            funding_tx(&txid(1), ADDRESS, 0.5),
            spending_tx(
                &txid(2),
                &txid(1),
                &[(ADDRESS, 0.003), (OTHER, 0.4), (ADDRESS, 0.002)],
                Some(4),
            ),
        ]);
        let candidate = check_self_send(&rpc, ADDRESS, &txid(2)).await.unwrap();

        assert_eq!(candidate.txid, txid(2));
        assert_eq!(candidate.amount_sats, 500_000);
        assert_eq!(candidate.confirmations, 4);
    }

    #[tokio::test]
    async fn test_unconfirmed_is_mempool() {
        let rpc = self_send(0.001, None);
        let result = verify_self_send(&rpc, ADDRESS, &txid(2), 3).await;

        assert!(result.valid);
        assert_eq!(result.status, SelfSendStatus::Mempool);
        assert_eq!(result.confirmations, Some(0));
    }

    #[tokio::test]
    async fn test_below_target_is_pending() {
        let rpc = self_send(0.001, Some(2));
        let result = verify_self_send(&rpc, ADDRESS, &txid(2), 3).await;
        assert_eq!(result.status, SelfSendStatus::Pending);
    }

    #[tokio::test]
    async fn test_zero_target_confirms_immediately() {
        let rpc = self_send(0.001, None);
        let result = verify_self_send(&rpc, ADDRESS, &txid(2), 0).await;
        assert_eq!(result.status, SelfSendStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_no_input_from_address() {
        let rpc = chain(vec![
            funding_tx(&txid(1), OTHER, 0.5),
            spending_tx(&txid(2), &txid(1), &[(ADDRESS, 0.001)], Some(1)),
        ]);
        let result = verify_self_send(&rpc, ADDRESS, &txid(2), 1).await;

        assert!(!result.valid);
        assert_eq!(result.status, SelfSendStatus::Invalid);
        assert!(result.error.unwrap().contains("No inputs from the specified address"));
    }

    #[tokio::test]
    async fn test_no_output_to_address() {
        let rpc = chain(vec![
            funding_tx(&txid(1), ADDRESS, 0.5),
            spending_tx(&txid(2), &txid(1), &[(OTHER, 0.001)], Some(1)),
        ]);
        let result = verify_self_send(&rpc, ADDRESS, &txid(2), 1).await;
        assert!(result.error.unwrap().contains("No outputs to the specified address"));
    }

    #[tokio::test]
    async fn test_amount_bounds() {
        let too_small = verify_self_send(&self_send(0.000001, Some(6)), ADDRESS, &txid(2), 1).await;
        assert_eq!(too_small.status, SelfSendStatus::Invalid);
        assert!(too_small.error.unwrap().contains("too small"));

        let at_min = verify_self_send(&self_send(0.000006, Some(6)), ADDRESS, &txid(2), 1).await;
        assert!(at_min.valid);

        let at_max = verify_self_send(&self_send(0.01, Some(6)), ADDRESS, &txid(2), 1).await;
        assert!(at_max.valid);

        let too_large = verify_self_send(&self_send(0.02, Some(6)), ADDRESS, &txid(2), 1).await;
        assert_eq!(too_large.status, SelfSendStatus::Invalid);
        assert!(too_large.error.unwrap().contains("too large"));
    }

    #[tokio::test]
    async fn test_outputs_to_address_are_summed() {
        let rpc = chain(vec![
            funding_tx(&txid(1), ADDRESS, 0.5),
            spending_tx(&txid(2), &txid(1), &[(ADDRESS, 0.006), (ADDRESS, 0.006)], Some(1)),
        ]);
        let result = verify_self_send(&rpc, ADDRESS, &txid(2), 1).await;
        assert!(result.error.unwrap().contains("too large"));
    }

    #[tokio::test]
    async fn test_prevout_used_without_lookup() {
        let tx = json!({
            "txid": txid(2),
            "vin": [{
                "txid": txid(9),
                "vout": 3,
                "prevout": { "value": 0.5, "scriptPubKey": { "address": ADDRESS } }
            }],
            "vout": [{ "value": 0.001, "n": 0, "scriptPubKey": { "address": ADDRESS } }],
            "confirmations": 1
        });
        // txid(9) is unknown to the mock, so any lookup would fail
        let rpc = chain(vec![tx]);

        let result = verify_self_send(&rpc, ADDRESS, &txid(2), 1).await;
        assert_eq!(result.status, SelfSendStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let rpc = chain(vec![json!({ "txid": txid(2), "vout": [] })]);
        let result = verify_self_send(&rpc, ADDRESS, &txid(2), 1).await;

        assert_eq!(result.status, SelfSendStatus::Invalid);
        assert!(result.error.unwrap().contains("Malformed"));
    }

    #[tokio::test]
    async fn test_rpc_error_is_invalid_result() {
        let rpc = chain(Vec::new());
        let result = verify_self_send(&rpc, ADDRESS, &txid(7), 1).await;

        assert!(!result.valid);
        assert_eq!(result.status, SelfSendStatus::Invalid);
        assert!(result.error.unwrap().contains("No such mempool"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(6, 3), SelfSendStatus::Confirmed);
        assert_eq!(status_for(3, 3), SelfSendStatus::Confirmed);
        assert_eq!(status_for(0, 3), SelfSendStatus::Mempool);
        assert_eq!(status_for(2, 3), SelfSendStatus::Pending);
        assert_eq!(status_for(0, 0), SelfSendStatus::Confirmed);
    }
}
