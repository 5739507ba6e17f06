//! Mempool Watcher
//!
//! Polls `getrawmempool` and emits added/removed txid diffs over a channel.
//!
//! Each loop iteration takes a burst of back-to-back samples before sleeping,
//! and every sample is diffed against the one immediately before it. A
//! transaction that enters and leaves the pool within one poll interval
//! (broadcast and mined in the same block, RBF replacement) is still
//! reported.
//!
//! Failed samples are swallowed: the previous snapshot is kept, nothing is
//! emitted, and the failure is logged and counted (`failed_samples`).
//!
//! The first successful sample seeds the snapshot and is handed out once
//! through [`MempoolWatch::initial_snapshot`], so a consumer can sweep
//! exactly the set the first diff is computed against.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::types::MempoolDiff;
use crate::rpc::{BitcoinRpc, RpcError};

/// Lower bound for samples taken per poll iteration
pub const MIN_SAMPLES_PER_TICK: usize = 2;

/// Diffs buffered before the poller waits on the consumer
const DIFF_CHANNEL_CAPACITY: usize = 64;

/// Watcher tunables
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Delay between poll iterations
    pub poll_interval: Duration,
    /// Consecutive samples taken inside one iteration
    pub samples_per_tick: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1_000),
            samples_per_tick: 6,
        }
    }
}

impl WatcherConfig {
    /// Samples per tick, clamped to the minimum burst
    pub fn samples(&self) -> usize {
        self.samples_per_tick.max(MIN_SAMPLES_PER_TICK)
    }
}

/// Subscription to a running mempool poller
///
/// Dropping the handle (or calling [`MempoolWatch::stop`]) cancels the
/// poller. The diff receiver goes with it, so nothing is observed after
/// stop even if an RPC call was already in flight.
#[derive(Debug)]
pub struct MempoolWatch {
    diffs: mpsc::Receiver<MempoolDiff>,
    seed: Option<oneshot::Receiver<Vec<String>>>,
    cancel: CancellationToken,
    failed_samples: Arc<AtomicU64>,
}

impl MempoolWatch {
    /// Start polling on the current Tokio runtime
    pub fn spawn<R>(rpc: Arc<R>, config: WatcherConfig) -> Self
    where
        R: BitcoinRpc + ?Sized + 'static,
    {
        let (sender, diffs) = mpsc::channel(DIFF_CHANNEL_CAPACITY);
        let (seed_sender, seed) = oneshot::channel();
        let cancel = CancellationToken::new();
        let failed_samples = Arc::new(AtomicU64::new(0));

        let poller = MempoolPoller {
            rpc,
            config,
            previous: None,
            seed: Some(seed_sender),
            failed_samples: failed_samples.clone(),
            sender,
            cancel: cancel.clone(),
        };
        tokio::spawn(poller.run());

        Self {
            diffs,
            seed: Some(seed),
            cancel,
            failed_samples,
        }
    }

    /// Txids of the sample that seeded the snapshot
    ///
    /// Resolves once the first sample succeeds and precedes every diff.
    /// Returns `None` on later calls or if the poller exited first.
    pub async fn initial_snapshot(&mut self) -> Option<Vec<String>> {
        match self.seed.take() {
            Some(seed) => seed.await.ok(),
            None => None,
        }
    }

    /// Next diff in poll order, `None` once the poller has exited
    pub async fn next_diff(&mut self) -> Option<MempoolDiff> {
        self.diffs.recv().await
    }

    /// Number of samples that failed and were skipped
    pub fn failed_samples(&self) -> u64 {
        self.failed_samples.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Halt polling and drop the subscription
    pub fn stop(self) {}
}

impl Drop for MempoolWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct MempoolPoller<R: ?Sized> {
    rpc: Arc<R>,
    config: WatcherConfig,
    /// `None` until the first successful sample
    previous: Option<HashSet<String>>,
    seed: Option<oneshot::Sender<Vec<String>>>,
    failed_samples: Arc<AtomicU64>,
    sender: mpsc::Sender<MempoolDiff>,
    cancel: CancellationToken,
}

impl<R: BitcoinRpc + ?Sized> MempoolPoller<R> {
    async fn run(mut self) {
        debug!(
            target: "reserve::mempool",
            interval_ms = self.config.poll_interval.as_millis() as u64,
            samples = self.config.samples(),
            "mempool watcher started"
        );

        loop {
            for _ in 0..self.config.samples() {
                let sample = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    sample = self.rpc.get_raw_mempool() => sample,
                };

                if let Some(diff) = self.apply_sample(sample) {
                    trace!(
                        target: "reserve::mempool",
                        added = diff.added.len(),
                        removed = diff.removed.len(),
                        "mempool changed"
                    );

                    let delivered = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => false,
                        sent = self.sender.send(diff) => sent.is_ok(),
                    };
                    if !delivered {
                        break;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        debug!(target: "reserve::mempool", "mempool watcher stopped");
    }

    /// Fold one sample into the snapshot, returning a non-empty diff
    fn apply_sample(&mut self, sample: Result<Vec<String>, RpcError>) -> Option<MempoolDiff> {
        let current: HashSet<String> = match sample {
            Ok(txids) => {
                if let Some(seed) = self.seed.take() {
                    // Receiver may be gone already
                    let _ = seed.send(txids.clone());
                }
                txids.into_iter().collect()
            }
            Err(e) => {
                let failures = self.failed_samples.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    target: "reserve::mempool",
                    error = %e,
                    failures,
                    "mempool sample failed, keeping previous snapshot"
                );
                return None;
            }
        };

        // Transactions already present at start never produce an `added`.
        let diff = self
            .previous
            .as_ref()
            .map(|previous| MempoolDiff::between(previous, &current))
            .filter(|diff| !diff.is_empty());

        self.previous = Some(current);
        diff
    }
}
