//! Bitcoin Node RPC
//!
//! - **client**: JSON-RPC transport and the `BitcoinRpc` seam
//! - **types**: response payloads

pub mod client;
pub mod types;

pub use client::{BitcoinRpc, RpcClient, RpcConfig, RpcError, DEFAULT_RPC_TIMEOUT};
pub use types::{
    ListTransactionsEntry, ListUnspentEntry, MempoolEntry, RawTransaction, RawTxInput,
    RawTxOutput, ScriptPubKey,
};

#[cfg(test)]
pub use client::MockBitcoinRpc;
