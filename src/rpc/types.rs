//! Bitcoin Core JSON-RPC Payload Types
//!
//! Only the fields read by the indexer and the self-send tracker are
//! modelled. Anything else in the node's responses is ignored.

use serde::{Deserialize, Serialize};

/// One entry of `listunspent`
#[derive(Debug, Clone, Deserialize)]
pub struct ListUnspentEntry {
    pub txid: String,
    pub vout: u32,
    pub address: Option<String>,
    /// Amount in BTC
    pub amount: f64,
    pub confirmations: u32,
    pub label: Option<String>,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: Option<String>,
    pub spendable: Option<bool>,
}

/// One row of `listtransactions`
///
/// A self-send shows up twice, once as "send" and once as "receive".
#[derive(Debug, Clone, Deserialize)]
pub struct ListTransactionsEntry {
    pub txid: String,
    pub address: Option<String>,
    pub category: String,
    /// Signed amount in BTC (negative for sends)
    pub amount: f64,
    pub vout: Option<u32>,
    pub fee: Option<f64>,
    /// Negative when the transaction conflicts with the best chain
    pub confirmations: Option<i64>,
    pub blockheight: Option<u64>,
    pub time: Option<u64>,
}

/// Fee block of a mempool entry
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MempoolFees {
    pub base: f64,
    #[serde(default)]
    pub modified: f64,
}

/// Result of `getmempoolentry` and the values of `getrawmempool true`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MempoolEntry {
    #[serde(default)]
    pub vsize: u64,
    #[serde(default)]
    pub weight: u64,
    /// Unix time the transaction entered the pool
    #[serde(default)]
    pub time: u64,
    /// Chain height when the transaction entered the pool
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub fees: MempoolFees,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(rename = "bip125-replaceable", default)]
    pub bip125_replaceable: bool,
}

/// Output script as reported by the node
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptPubKey {
    pub hex: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Present on Bitcoin Core 22+
    pub address: Option<String>,
    /// Pre-22 nodes report a list instead
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl ScriptPubKey {
    /// Address paid by this script, if the node could derive one
    pub fn address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .or_else(|| self.addresses.first().map(String::as_str))
    }
}

/// Previous output attached to an input (verbosity 2 only)
#[derive(Debug, Clone, Deserialize)]
pub struct RawPrevout {
    pub value: f64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
    pub height: Option<u64>,
    pub generated: Option<bool>,
}

/// Transaction input from `getrawtransaction <txid> true`
#[derive(Debug, Clone, Deserialize)]
pub struct RawTxInput {
    /// Absent on coinbase inputs
    pub txid: Option<String>,
    pub vout: Option<u32>,
    pub coinbase: Option<String>,
    pub prevout: Option<RawPrevout>,
    pub sequence: Option<u32>,
}

impl RawTxInput {
    pub fn is_coinbase(&self) -> bool {
        self.coinbase.is_some()
    }
}

/// Transaction output from `getrawtransaction <txid> true`
#[derive(Debug, Clone, Deserialize)]
pub struct RawTxOutput {
    /// Value in BTC
    pub value: f64,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

/// Decoded transaction from `getrawtransaction <txid> true`
///
/// `vin` and `vout` are optional so a truncated payload can be reported as
/// malformed instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    pub hash: Option<String>,
    pub vin: Option<Vec<RawTxInput>>,
    pub vout: Option<Vec<RawTxOutput>>,
    /// Missing while the transaction is unconfirmed
    pub confirmations: Option<u32>,
    pub blockhash: Option<String>,
    pub blocktime: Option<u64>,
}

impl RawTransaction {
    pub fn confirmations(&self) -> u32 {
        self.confirmations.unwrap_or(0)
    }
}
