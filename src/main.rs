//! ReserveBTC Proof CLI
//!
//! Offline commands (`message`, `witness`, `verify`, `sign`) need no node.
//! Node commands read `RESERVE_*` variables, see [`reserve_proof::config`].

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, PrivateKey};
use clap::{Parser, Subcommand};
use reserve_proof::common::{ReserveError, Result};
use reserve_proof::logging::{init_from_config, init_logging, LogLevel};
use reserve_proof::ownership::{address_to_witness_program, random_salt, OwnershipBinding};
use reserve_proof::signature::{sign_simple, verify_signature, VerifySignatureRequest};
use reserve_proof::units::{btc_to_sats, format_sats};
use reserve_proof::{ChainIndexer, ReserveConfig, RpcClient, SelfSendRequest, SelfSendTracker};

#[derive(Parser)]
#[command(name = "reserve-proof")]
#[command(about = "Bitcoin address ownership proofs and self-send tracking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the binding message for an EVM/BTC address pair
    Message {
        /// EVM address (20 bytes hex, 0x optional)
        #[arg(long)]
        evm: String,

        /// Segwit Bitcoin address
        #[arg(long)]
        btc: String,

        /// 32-byte salt as hex (random if omitted)
        #[arg(long)]
        salt: Option<String>,

        #[arg(long)]
        nonce: String,

        /// Block height bound into the message
        #[arg(long)]
        height: u64,
    },

    /// Print the 32-byte witness program of an address
    Witness { address: String },

    /// Verify a BIP-322 simple signature
    Verify {
        #[arg(short, long)]
        address: String,

        #[arg(short, long, conflicts_with = "message_file")]
        message: Option<String>,

        /// Read the message from a file instead
        #[arg(long)]
        message_file: Option<PathBuf>,

        /// Signature as base64 or hex
        #[arg(short, long)]
        signature: String,
    },

    /// Sign a message with a WIF key (test tooling)
    Sign {
        #[arg(short, long)]
        address: String,

        /// WIF private key (or set RESERVE_SIGNING_WIF)
        #[arg(long, env = "RESERVE_SIGNING_WIF", hide_env_values = true)]
        wif: String,

        #[arg(short, long)]
        message: String,
    },

    /// List wallet UTXOs
    Utxos { addresses: Vec<String> },

    /// Show recent wallet transactions
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Track a self-send until it confirms, fails or expires
    Track {
        address: String,

        #[arg(short, long, default_value = "1")]
        confirmations: u32,

        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Print the effective node configuration
    Config,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli.command).await {
        eprintln!("error [{}]: {}", e.error_code(), e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Message {
            evm,
            btc,
            salt,
            nonce,
            height,
        } => {
            init_logging(LogLevel::Warn, false)?;
            build_message(&evm, &btc, salt.as_deref(), &nonce, height)
        }
        Commands::Witness { address } => {
            let program = address_to_witness_program(&address)
                .map_err(reserve_proof::OwnershipError::from)?;
            println!("{}", hex::encode(program));
            Ok(())
        }
        Commands::Verify {
            address,
            message,
            message_file,
            signature,
        } => {
            init_logging(LogLevel::Warn, false)?;
            let message = match (message, message_file) {
                (Some(message), _) => message,
                (None, Some(path)) => std::fs::read_to_string(path)?,
                (None, None) => return Err(ReserveError::validation("--message or --message-file is required")),
            };
            verify(address, message, signature)
        }
        Commands::Sign {
            address,
            wif,
            message,
        } => sign(&address, &wif, &message),
        Commands::Utxos { addresses } => {
            let indexer = connect()?;
            let addresses = (!addresses.is_empty()).then_some(addresses);
            let utxos = indexer.get_utxos(addresses).await?;

            println!("{} UTXO(s)", utxos.len());
            for utxo in utxos {
                println!(
                    "{}:{}  {}  {} conf  {}",
                    utxo.txid,
                    utxo.output_index,
                    format_sats(btc_to_sats(utxo.amount_btc)),
                    utxo.confirmations,
                    utxo.address.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Commands::History { limit } => {
            let indexer = connect()?;
            for entry in indexer.get_wallet_history(limit).await? {
                println!("{}  {:>8}  {:+.8} BTC", entry.txid, entry.category, entry.amount_btc);
            }
            Ok(())
        }
        Commands::Track {
            address,
            confirmations,
            timeout_ms,
        } => {
            let config = ReserveConfig::from_env()?;
            init_from_config(&config)?;
            track(&config, address, confirmations, timeout_ms).await
        }
        Commands::Config => {
            ReserveConfig::from_env()?.print_summary();
            Ok(())
        }
    }
}

fn build_message(evm: &str, btc: &str, salt: Option<&str>, nonce: &str, height: u64) -> Result<()> {
    let salt = match salt {
        Some(hex_salt) => hex::decode(hex_salt.trim_start_matches("0x"))
            .map_err(|e| ReserveError::validation(format!("salt is not hex: {}", e)))?,
        None => random_salt().to_vec(),
    };

    let binding = OwnershipBinding::build(evm, btc, &salt, nonce, height)?;

    println!("witness_program: {}", hex::encode(binding.witness_program));
    println!("salt:            {}", hex::encode(&salt));
    println!("checksum:        0x{}", hex::encode(binding.checksum));
    println!();
    println!("{}", binding.message);
    Ok(())
}

fn verify(address: String, message: String, signature: String) -> Result<()> {
    let result = verify_signature(&VerifySignatureRequest {
        btc_address: address,
        message,
        signature,
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&result).unwrap_or_else(|_| format!("{:?}", result))
    );
    if result.valid {
        Ok(())
    } else {
        Err(ReserveError::validation(result.error.unwrap_or_default()))
    }
}

fn sign(address: &str, wif: &str, message: &str) -> Result<()> {
    let address = Address::<NetworkUnchecked>::from_str(address)
        .map_err(|e| ReserveError::validation(format!("invalid address: {}", e)))?
        .assume_checked();
    let key = PrivateKey::from_wif(wif)
        .map_err(|e| ReserveError::validation(format!("invalid WIF key: {}", e)))?;

    let signature = sign_simple(&address, message.as_bytes(), &key)
        .map_err(|e| ReserveError::validation(e.to_string()))?;
    println!("{}", STANDARD.encode(signature));
    Ok(())
}

fn connect() -> Result<ChainIndexer<RpcClient>> {
    let config = ReserveConfig::from_env()?;
    init_from_config(&config)?;

    let client = RpcClient::new(&config.rpc_config())?;
    Ok(ChainIndexer::new(Arc::new(client), config.watcher_config()))
}

async fn track(
    config: &ReserveConfig,
    address: String,
    confirmations: u32,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let client = Arc::new(RpcClient::new(&config.rpc_config())?);
    let tracker = SelfSendTracker::new(client, config.tracker_config());

    let mut request = SelfSendRequest::new(address, confirmations);
    request.timeout_ms = timeout_ms;

    let mut handle = tracker.start_tracking(request)?;
    println!("tracking {}", handle.id);

    loop {
        tokio::select! {
            update = handle.updates.recv() => match update {
                Some(update) => {
                    println!(
                        "{}",
                        serde_json::to_string(&update).unwrap_or_else(|_| format!("{:?}", update))
                    );
                    if update.is_terminal() {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracker.stop_tracking(&handle.id);
                println!("stopped");
                break;
            }
        }
    }

    Ok(())
}
