//! Chain Indexer Types

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::rpc::{ListTransactionsEntry, ListUnspentEntry};

/// Unspent output as seen by the wallet, recomputed on every query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedUtxo {
    pub txid: String,
    pub output_index: u32,
    pub address: Option<String>,
    pub amount_btc: f64,
    pub confirmations: u32,
}

impl From<ListUnspentEntry> for NormalizedUtxo {
    fn from(entry: ListUnspentEntry) -> Self {
        Self {
            txid: entry.txid,
            output_index: entry.vout,
            address: entry.address,
            amount_btc: entry.amount,
            confirmations: entry.confirmations,
        }
    }
}

/// One wallet history row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletHistoryEntry {
    pub txid: String,
    pub amount_btc: f64,
    /// "send", "receive", "generate", "immature" or "orphan"
    pub category: String,
}

impl From<ListTransactionsEntry> for WalletHistoryEntry {
    fn from(entry: ListTransactionsEntry) -> Self {
        Self {
            txid: entry.txid,
            amount_btc: entry.amount,
            category: entry.category,
        }
    }
}

/// Change between two consecutive mempool samples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl MempoolDiff {
    /// `added = current - previous`, `removed = previous - current`
    pub fn between(previous: &HashSet<String>, current: &HashSet<String>) -> Self {
        Self {
            added: current.difference(previous).cloned().collect(),
            removed: previous.difference(current).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
