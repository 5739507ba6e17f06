//! Environment-based Configuration
//!
//! Node credentials always come from the environment, never from code or
//! command-line flags.
//!
//! # Environment Variables
//!
//! ## Node
//! - `RESERVE_NETWORK` - "mainnet", "testnet" or "regtest" (default: "regtest")
//! - `RESERVE_BITCOIN_RPC_URL` - bitcoind JSON-RPC endpoint (default: localhost, network port)
//! - `RESERVE_BITCOIN_RPC_USER` - RPC user (required)
//! - `RESERVE_BITCOIN_RPC_PASSWORD` - RPC password (required)
//! - `RESERVE_BITCOIN_RPC_WALLET` - wallet name for wallet-scoped calls
//! - `RESERVE_RPC_TIMEOUT_SECS` - per-request timeout (default: 30)
//!
//! ## Tracking
//! - `RESERVE_POLL_INTERVAL_MS` - mempool poll delay (default: 1000)
//! - `RESERVE_SAMPLES_PER_TICK` - samples per poll iteration, at least 2 (default: 6)
//! - `RESERVE_RECHECK_INTERVAL_SECS` - candidate recheck period (default: 30)
//! - `RESERVE_TRACKING_TIMEOUT_MS` - default session lifetime (default: 1800000)
//!
//! ## Logging
//! - `RESERVE_LOG_LEVEL` - trace, debug, info, warn, error (default: "info")
//! - `RESERVE_LOG_JSON` - "1" for JSON output (always on for mainnet)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::indexer::{WatcherConfig, MIN_SAMPLES_PER_TICK};
use crate::rpc::RpcConfig;
use crate::self_send::utils::{MAX_TRACKING_TIMEOUT_MS, MIN_TRACKING_TIMEOUT_MS};
use crate::self_send::TrackerConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Bitcoin network the node runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            _ => Err(ConfigError::InvalidValue(
                "RESERVE_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Default bitcoind RPC endpoint for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "http://127.0.0.1:8332",
            Network::Testnet => "http://127.0.0.1:18332",
            Network::Regtest => "http://127.0.0.1:18443",
        }
    }

    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct ReserveConfig {
    pub network: Network,

    pub rpc_url: String,
    pub rpc_user: String,
    pub rpc_password: String,
    pub rpc_wallet: Option<String>,
    pub rpc_timeout: Duration,

    pub poll_interval: Duration,
    pub samples_per_tick: usize,
    pub recheck_interval: Duration,
    pub tracking_timeout: Duration,

    pub log_level: String,
    pub log_json: bool,
}

impl ReserveConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network: Network = lookup("RESERVE_NETWORK")
            .unwrap_or_else(|| "regtest".to_string())
            .parse()?;

        let rpc_url = lookup("RESERVE_BITCOIN_RPC_URL")
            .unwrap_or_else(|| network.default_rpc_url().to_string());

        let rpc_user = required(&lookup, "RESERVE_BITCOIN_RPC_USER")?;
        let rpc_password = required(&lookup, "RESERVE_BITCOIN_RPC_PASSWORD")?;
        let rpc_wallet = lookup("RESERVE_BITCOIN_RPC_WALLET").filter(|w| !w.is_empty());

        let rpc_timeout = Duration::from_secs(parse_or(&lookup, "RESERVE_RPC_TIMEOUT_SECS", 30)?);
        let poll_interval = Duration::from_millis(parse_or(&lookup, "RESERVE_POLL_INTERVAL_MS", 1_000)?);

        let samples_per_tick: usize = parse_or(&lookup, "RESERVE_SAMPLES_PER_TICK", 6)?;
        if samples_per_tick < MIN_SAMPLES_PER_TICK {
            return Err(ConfigError::InvalidValue(
                "RESERVE_SAMPLES_PER_TICK".to_string(),
                format!("must be at least {}", MIN_SAMPLES_PER_TICK),
            ));
        }

        let recheck_interval =
            Duration::from_secs(parse_or(&lookup, "RESERVE_RECHECK_INTERVAL_SECS", 30)?);

        let tracking_timeout_ms: u64 = parse_or(&lookup, "RESERVE_TRACKING_TIMEOUT_MS", 1_800_000)?;
        if !(MIN_TRACKING_TIMEOUT_MS..=MAX_TRACKING_TIMEOUT_MS).contains(&tracking_timeout_ms) {
            return Err(ConfigError::InvalidValue(
                "RESERVE_TRACKING_TIMEOUT_MS".to_string(),
                format!(
                    "must be between {} and {}",
                    MIN_TRACKING_TIMEOUT_MS, MAX_TRACKING_TIMEOUT_MS
                ),
            ));
        }

        let log_level = lookup("RESERVE_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = lookup("RESERVE_LOG_JSON").map(|v| v == "1").unwrap_or(false);

        Ok(Self {
            network,
            rpc_url,
            rpc_user,
            rpc_password,
            rpc_wallet,
            rpc_timeout,
            poll_interval,
            samples_per_tick,
            recheck_interval,
            tracking_timeout: Duration::from_millis(tracking_timeout_ms),
            log_level,
            log_json,
        })
    }

    pub fn rpc_config(&self) -> RpcConfig {
        let config = RpcConfig::new(&self.rpc_url, &self.rpc_user, &self.rpc_password)
            .with_timeout(self.rpc_timeout);
        match &self.rpc_wallet {
            Some(wallet) => config.with_wallet(wallet),
            None => config,
        }
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: self.poll_interval,
            samples_per_tick: self.samples_per_tick,
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            default_timeout: self.tracking_timeout,
            recheck_interval: self.recheck_interval,
            watcher: self.watcher_config(),
        }
    }

    /// Print configuration summary (hiding sensitive values)
    pub fn print_summary(&self) {
        println!("=== ReserveBTC Proof Configuration ===");
        println!("Network: {:?}", self.network);
        println!("Bitcoin RPC: {}", self.rpc_url);
        println!("RPC User: {}", self.rpc_user);
        println!("RPC Password: ********");
        println!("Wallet: {}", self.rpc_wallet.as_deref().unwrap_or("(default)"));
        println!("Poll Interval: {} ms", self.poll_interval.as_millis());
        println!("Samples Per Tick: {}", self.samples_per_tick);
        println!("Tracking Timeout: {} ms", self.tracking_timeout.as_millis());
        println!("Log Level: {}", self.log_level);
        println!("======================================");
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("not a number: {}", raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ReserveConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ReserveConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const CREDENTIALS: [(&str, &str); 2] = [
        ("RESERVE_BITCOIN_RPC_USER", "user"),
        ("RESERVE_BITCOIN_RPC_PASSWORD", "pass"),
    ];

    #[test]
    fn test_network_parsing() {
        assert!(matches!("mainnet".parse::<Network>(), Ok(Network::Mainnet)));
        assert!(matches!("testnet".parse::<Network>(), Ok(Network::Testnet)));
        assert!(matches!("REGTEST".parse::<Network>(), Ok(Network::Regtest)));
        assert!("signet".parse::<Network>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = load(&CREDENTIALS).unwrap();

        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.rpc_url, "http://127.0.0.1:18443");
        assert_eq!(config.rpc_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_millis(1_000));
        assert_eq!(config.samples_per_tick, 6);
        assert_eq!(config.tracking_timeout, Duration::from_secs(1_800));
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert!(config.rpc_wallet.is_none());
    }

    #[test]
    fn test_credentials_required() {
        assert!(matches!(
            load(&[("RESERVE_BITCOIN_RPC_USER", "user")]),
            Err(ConfigError::MissingEnvVar(name)) if name == "RESERVE_BITCOIN_RPC_PASSWORD"
        ));
        assert!(matches!(
            load(&[("RESERVE_BITCOIN_RPC_PASSWORD", "pass")]),
            Err(ConfigError::MissingEnvVar(name)) if name == "RESERVE_BITCOIN_RPC_USER"
        ));
    }

    #[test]
    fn test_network_default_port_and_wallet() {
        let mut vars = CREDENTIALS.to_vec();
        vars.push(("RESERVE_NETWORK", "mainnet"));
        vars.push(("RESERVE_BITCOIN_RPC_WALLET", "reserve"));
        let config = load(&vars).unwrap();

        assert_eq!(config.rpc_url, "http://127.0.0.1:8332");
        assert_eq!(config.network.bitcoin_network(), bitcoin::Network::Bitcoin);
        assert_eq!(config.rpc_config().wallet.as_deref(), Some("reserve"));
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = CREDENTIALS.to_vec();
        vars.push(("RESERVE_SAMPLES_PER_TICK", "1"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue(..))));

        let mut vars = CREDENTIALS.to_vec();
        vars.push(("RESERVE_TRACKING_TIMEOUT_MS", "10"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue(..))));

        let mut vars = CREDENTIALS.to_vec();
        vars.push(("RESERVE_POLL_INTERVAL_MS", "soon"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue(..))));
    }

    #[test]
    fn test_tracker_config_derived() {
        let mut vars = CREDENTIALS.to_vec();
        vars.push(("RESERVE_POLL_INTERVAL_MS", "250"));
        vars.push(("RESERVE_RECHECK_INTERVAL_SECS", "10"));
        let tracker = load(&vars).unwrap().tracker_config();

        assert_eq!(tracker.watcher.poll_interval, Duration::from_millis(250));
        assert_eq!(tracker.recheck_interval, Duration::from_secs(10));
        assert_eq!(tracker.default_timeout, Duration::from_secs(1_800));
    }
}
