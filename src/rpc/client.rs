//! Bitcoin Core JSON-RPC Client
//!
//! Thin HTTP transport with Basic auth. The typed wrappers carry no retry
//! or backoff logic; callers decide their own resilience policy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, trace};

use super::types::{ListTransactionsEntry, ListUnspentEntry, MempoolEntry, RawTransaction};

/// Default per-request timeout
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// RPC errors
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("RPC configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("node returned error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("invalid RPC response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Transport and HTTP failures may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Transport(_) | RpcError::Http { .. })
    }
}

/// Connection settings for a Bitcoin node
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    /// Wallet name, appended as `/wallet/<name>`
    pub wallet: Option<String>,
    pub timeout: Duration,
}

impl RpcConfig {
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
            wallet: None,
            timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    pub fn with_wallet(mut self, wallet: impl Into<String>) -> Self {
        self.wallet = Some(wallet.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fail fast on missing endpoint or credentials
    pub fn validate(&self) -> Result<(), RpcError> {
        if self.url.trim().is_empty() {
            return Err(RpcError::Config("RPC URL is required".to_string()));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(RpcError::Config(format!(
                "RPC URL must be http(s): {}",
                self.url
            )));
        }
        if self.user.is_empty() {
            return Err(RpcError::Config("RPC user is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(RpcError::Config("RPC password is required".to_string()));
        }
        Ok(())
    }
}

/// Node calls consumed by the indexer and the self-send tracker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BitcoinRpc: Send + Sync {
    /// `getblockcount`
    async fn get_block_count(&self) -> Result<u64, RpcError>;

    /// `listunspent`; an empty address list means no filter
    async fn list_unspent(
        &self,
        min_conf: u32,
        max_conf: u32,
        addresses: Vec<String>,
    ) -> Result<Vec<ListUnspentEntry>, RpcError>;

    /// `listtransactions "*" count skip true`
    async fn list_transactions(
        &self,
        count: usize,
        skip: usize,
    ) -> Result<Vec<ListTransactionsEntry>, RpcError>;

    /// `getrawmempool false`
    async fn get_raw_mempool(&self) -> Result<Vec<String>, RpcError>;

    /// `getrawmempool true`
    async fn get_raw_mempool_verbose(&self) -> Result<HashMap<String, MempoolEntry>, RpcError>;

    /// `getmempoolentry`
    async fn get_mempool_entry(&self, txid: &str) -> Result<MempoolEntry, RpcError>;

    /// `getrawtransaction <txid> 2`
    ///
    /// Verbosity 2 attaches `prevout` to each input on Bitcoin Core 25 and
    /// later; older nodes treat any non-zero verbosity as verbose.
    async fn get_raw_transaction(&self, txid: &str) -> Result<RawTransaction, RpcError>;
}

/// JSON-RPC client for bitcoind
#[derive(Debug)]
pub struct RpcClient {
    client: Client,
    url: String,
    user: String,
    password: String,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a client; fails if URL or credentials are missing
    pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
        config.validate()?;

        let client = Client::builder().timeout(config.timeout).build()?;

        let base = config.url.trim_end_matches('/');
        let url = match &config.wallet {
            Some(wallet) => format!("{}/wallet/{}", base, wallet),
            None => base.to_string(),
        };

        Ok(Self {
            client,
            url,
            user: config.user.clone(),
            password: config.password.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint requests are sent to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue a raw JSON-RPC call and decode its `result`
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        trace!(target: "reserve::rpc", method, id, "sending request");

        let resp = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        // bitcoind answers RPC-level failures with HTTP 500 and an error
        // object, so the envelope is inspected before the status code.
        let envelope: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) if status.is_success() => {
                return Err(RpcError::InvalidResponse(format!("{}: {}", method, e)));
            }
            Err(_) => {
                return Err(RpcError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
        };

        if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error")
                .to_string();
            debug!(target: "reserve::rpc", method, code, %message, "node returned error");
            return Err(RpcError::Node { code, message });
        }

        if !status.is_success() {
            return Err(RpcError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let result = envelope.get("result").cloned().unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("{}: {}", method, e)))
    }

    /// `getbalance "*" 0 true`
    pub async fn get_balance(&self) -> Result<f64, RpcError> {
        self.call("getbalance", json!(["*", 0, true])).await
    }

    /// `sendtoaddress`, returns the txid
    pub async fn send_to_address(&self, address: &str, amount_btc: f64) -> Result<String, RpcError> {
        self.call("sendtoaddress", json!([address, amount_btc])).await
    }

    /// `getnewaddress`
    pub async fn get_new_address(
        &self,
        label: Option<&str>,
        address_type: Option<&str>,
    ) -> Result<String, RpcError> {
        let label = label.unwrap_or("");
        let params = match address_type {
            Some(kind) => json!([label, kind]),
            None => json!([label]),
        };
        self.call("getnewaddress", params).await
    }

    /// Mine `count` blocks (regtest), returns the block hashes
    ///
    /// Without an explicit address a fresh wallet address receives the
    /// coinbase outputs.
    pub async fn generate_blocks(
        &self,
        count: u32,
        address: Option<&str>,
    ) -> Result<Vec<String>, RpcError> {
        let address = match address {
            Some(addr) => addr.to_string(),
            None => self.get_new_address(None, None).await?,
        };
        self.call("generatetoaddress", json!([count, address])).await
    }
}

#[async_trait]
impl BitcoinRpc for RpcClient {
    async fn get_block_count(&self) -> Result<u64, RpcError> {
        self.call("getblockcount", json!([])).await
    }

    async fn list_unspent(
        &self,
        min_conf: u32,
        max_conf: u32,
        addresses: Vec<String>,
    ) -> Result<Vec<ListUnspentEntry>, RpcError> {
        let params = if addresses.is_empty() {
            json!([min_conf, max_conf])
        } else {
            json!([min_conf, max_conf, addresses])
        };
        self.call("listunspent", params).await
    }

    async fn list_transactions(
        &self,
        count: usize,
        skip: usize,
    ) -> Result<Vec<ListTransactionsEntry>, RpcError> {
        self.call("listtransactions", json!(["*", count, skip, true]))
            .await
    }

    async fn get_raw_mempool(&self) -> Result<Vec<String>, RpcError> {
        self.call("getrawmempool", json!([false])).await
    }

    async fn get_raw_mempool_verbose(&self) -> Result<HashMap<String, MempoolEntry>, RpcError> {
        self.call("getrawmempool", json!([true])).await
    }

    async fn get_mempool_entry(&self, txid: &str) -> Result<MempoolEntry, RpcError> {
        self.call("getmempoolentry", json!([txid])).await
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<RawTransaction, RpcError> {
        self.call("getrawtransaction", json!([txid, 2])).await
    }
}
