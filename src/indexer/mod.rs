//! Chain Indexer
//!
//! Stateless wallet queries (UTXOs, history) plus the stateful mempool
//! watcher.
//!
//! ## Components
//!
//! - **types**: normalized UTXO / history rows and mempool diffs
//! - **mempool**: burst-sampling `getrawmempool` poller

pub mod mempool;
pub mod types;

use std::sync::Arc;

use tracing::debug;

use crate::rpc::{BitcoinRpc, RpcError};

pub use mempool::{MempoolWatch, WatcherConfig, MIN_SAMPLES_PER_TICK};
pub use types::{MempoolDiff, NormalizedUtxo, WalletHistoryEntry};

/// Highest confirmation count passed to `listunspent`
const MAX_CONFIRMATIONS: u32 = 9_999_999;

/// Read-only view of the node's wallet and mempool
pub struct ChainIndexer<R: ?Sized> {
    rpc: Arc<R>,
    watcher: WatcherConfig,
}

impl<R: ?Sized> Clone for ChainIndexer<R> {
    fn clone(&self) -> Self {
        Self {
            rpc: self.rpc.clone(),
            watcher: self.watcher.clone(),
        }
    }
}

impl<R: BitcoinRpc + ?Sized + 'static> ChainIndexer<R> {
    pub fn new(rpc: Arc<R>, watcher: WatcherConfig) -> Self {
        Self { rpc, watcher }
    }

    pub fn rpc(&self) -> &Arc<R> {
        &self.rpc
    }

    pub fn watcher_config(&self) -> &WatcherConfig {
        &self.watcher
    }

    /// Wallet UTXOs, optionally filtered by address
    ///
    /// Includes unconfirmed outputs. An empty wallet yields an empty list.
    pub async fn get_utxos(
        &self,
        addresses: Option<Vec<String>>,
    ) -> Result<Vec<NormalizedUtxo>, RpcError> {
        let entries = self
            .rpc
            .list_unspent(0, MAX_CONFIRMATIONS, addresses.unwrap_or_default())
            .await?;

        debug!(target: "reserve::rpc", count = entries.len(), "listunspent");
        Ok(entries.into_iter().map(NormalizedUtxo::from).collect())
    }

    /// Most recent `limit` wallet history rows
    ///
    /// Rows are not deduplicated: a self-send appears as both a "send" and a
    /// "receive" row with the same txid.
    pub async fn get_wallet_history(&self, limit: usize) -> Result<Vec<WalletHistoryEntry>, RpcError> {
        let entries = self.rpc.list_transactions(limit, 0).await?;
        Ok(entries.into_iter().map(WalletHistoryEntry::from).collect())
    }

    /// Start a mempool watcher with this indexer's tunables
    pub fn watch_mempool(&self) -> MempoolWatch {
        MempoolWatch::spawn(self.rpc.clone(), self.watcher.clone())
    }
}
