//! Regtest tests against a live bitcoind
//!
//! Start a node with a loaded wallet and the transaction index:
//!
//! ```text
//! bitcoind -regtest -txindex=1 -rpcuser=user -rpcpassword=pass -fallbackfee=0.0001
//! bitcoin-cli -regtest -rpcuser=user -rpcpassword=pass createwallet reserve
//! ```
//!
//! Credentials come from `RESERVE_*` variables, falling back to the values above.

use std::sync::Arc;
use std::time::Duration;

use reserve_proof::{
    address_to_witness_program, BitcoinRpc, ChainIndexer, OwnershipBinding, ReserveConfig,
    RpcClient, SelfSendRequest, SelfSendStatus, SelfSendTracker,
};

const EVM_ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

fn regtest_config() -> ReserveConfig {
    ReserveConfig::from_lookup(|name| {
        std::env::var(name).ok().or_else(|| match name {
            "RESERVE_NETWORK" => Some("regtest".to_string()),
            "RESERVE_BITCOIN_RPC_USER" => Some("user".to_string()),
            "RESERVE_BITCOIN_RPC_PASSWORD" => Some("pass".to_string()),
            "RESERVE_POLL_INTERVAL_MS" => Some("200".to_string()),
            "RESERVE_RECHECK_INTERVAL_SECS" => Some("1".to_string()),
            _ => None,
        })
    })
    .unwrap()
}

fn client() -> Arc<RpcClient> {
    Arc::new(RpcClient::new(&regtest_config().rpc_config()).unwrap())
}

/// Skip test if no node answers
async fn node_available(client: &RpcClient) -> bool {
    client.get_block_count().await.is_ok()
}

#[tokio::test]
#[ignore = "Requires a running bitcoind regtest node"]
async fn test_block_count_advances() {
    let client = client();
    if !node_available(&client).await {
        eprintln!("Skipping test: bitcoind not available");
        return;
    }

    let before = client.get_block_count().await.unwrap();
    let hashes = client.generate_blocks(2, None).await.unwrap();
    let after = client.get_block_count().await.unwrap();

    assert_eq!(hashes.len(), 2);
    assert_eq!(after, before + 2);
}

#[tokio::test]
#[ignore = "Requires a running bitcoind regtest node with a loaded wallet"]
async fn test_wallet_utxos_and_history() {
    let client = client();
    if !node_available(&client).await {
        eprintln!("Skipping test: bitcoind not available");
        return;
    }

    let address = client.get_new_address(Some("reserve-test"), Some("bech32")).await.unwrap();
    client.generate_blocks(101, Some(&address)).await.unwrap();

    let indexer = ChainIndexer::new(client.clone(), regtest_config().watcher_config());

    let utxos = indexer.get_utxos(Some(vec![address.clone()])).await.unwrap();
    assert!(!utxos.is_empty());
    assert!(utxos.iter().all(|u| u.address.as_deref() == Some(address.as_str())));
    assert!(utxos.iter().any(|u| u.confirmations >= 100));

    let history = indexer.get_wallet_history(10).await.unwrap();
    assert!(!history.is_empty());
    assert!(history.len() <= 10);
}

#[tokio::test]
#[ignore = "Requires a running bitcoind regtest node with a loaded wallet"]
async fn test_mempool_watch_sees_new_transaction() {
    let client = client();
    if !node_available(&client).await {
        eprintln!("Skipping test: bitcoind not available");
        return;
    }

    let funding = client.get_new_address(None, Some("bech32")).await.unwrap();
    client.generate_blocks(101, Some(&funding)).await.unwrap();

    let indexer = ChainIndexer::new(client.clone(), regtest_config().watcher_config());
    let mut watch = indexer.watch_mempool();

    let target = client.get_new_address(None, Some("bech32")).await.unwrap();
    let txid = client.send_to_address(&target, 0.001).await.unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(diff) = watch.next_diff().await {
            if diff.added.contains(&txid) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    watch.stop();
    assert!(seen, "watcher never reported {}", txid);
}

#[tokio::test]
#[ignore = "Requires a fresh bitcoind regtest node started with -txindex=1"]
async fn test_self_send_tracked_to_confirmed() {
    let client = client();
    if !node_available(&client).await {
        eprintln!("Skipping test: bitcoind not available");
        return;
    }

    // Matured coinbase outputs at this address become the only spendable coins
    let address = client.get_new_address(Some("self-send"), Some("bech32")).await.unwrap();
    client.generate_blocks(101, Some(&address)).await.unwrap();

    let tracker = SelfSendTracker::new(client.clone(), regtest_config().tracker_config());
    let mut handle = tracker
        .start_tracking(SelfSendRequest::new(address.clone(), 1).with_timeout_ms(120_000))
        .unwrap();

    let txid = client.send_to_address(&address, 0.0001).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(15), handle.updates.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, SelfSendStatus::Mempool);
    assert_eq!(first.txid.as_deref(), Some(txid.as_str()));
    assert!(first.valid);

    client.generate_blocks(1, None).await.unwrap();

    let mut last = first;
    while !last.is_terminal() {
        last = tokio::time::timeout(Duration::from_secs(15), handle.updates.recv())
            .await
            .unwrap()
            .unwrap();
    }

    assert_eq!(last.status, SelfSendStatus::Confirmed);
    assert_eq!(last.confirmations, Some(1));
    assert!(handle.updates.recv().await.is_none());
    assert_eq!(tracker.active_sessions(), 0);
}

#[tokio::test]
#[ignore = "Requires a running bitcoind regtest node with a loaded wallet"]
async fn test_binding_for_wallet_address() {
    let client = client();
    if !node_available(&client).await {
        eprintln!("Skipping test: bitcoind not available");
        return;
    }

    let height = client.get_block_count().await.unwrap();
    let address = client.get_new_address(None, Some("bech32m")).await.unwrap();

    let binding = OwnershipBinding::build(EVM_ADDRESS, &address, &[7u8; 32], "1", height).unwrap();

    assert_eq!(binding.witness_program, address_to_witness_program(&address).unwrap());
    assert!(binding.message.contains(&address));
    assert!(binding.message.contains(&height.to_string()));
}
