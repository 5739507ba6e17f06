//! Self-Send Tracker
//!
//! Each tracking session owns a mempool watch, a one-shot timeout and a
//! periodic recheck. The session task looks for a transaction that spends
//! from and pays back to the tracked address and reports its progress
//! until it confirms, turns out invalid, or the timeout fires.
//!
//! # Flow
//! 1. `start_tracking` validates the request and registers the session
//! 2. the watcher's first snapshot is swept for candidates already present
//! 3. added txids from the watcher are checked as they appear
//! 4. the candidate is re-checked when it leaves the mempool and on every
//!    recheck tick, so confirmations keep accruing after it is mined
//!
//! Every step races the stop signal and the deadline, so a slow node can
//! neither delay the expiry nor slip a result in after it.
//!
//! Updates go out through the session registry. A result is only sent
//! while the session is still registered and `stop_tracking` removes it
//! under the same lock, so a stopped session never delivers a late update
//! even if an RPC call was in flight.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::types::{SelfSendRequest, SelfSendResult, SelfSendStatus, TrackingId};
use super::utils::{validate_self_send_request, DEFAULT_TRACKING_TIMEOUT};
use super::verify::{check_self_send, SelfSendCheckError};
use crate::indexer::{ChainIndexer, MempoolDiff, MempoolWatch, WatcherConfig};
use crate::logging::log_self_send_event;
use crate::rpc::BitcoinRpc;

/// Self-send tracker errors
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Tracker tunables
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Session lifetime when the request has no `timeout_ms`
    pub default_timeout: Duration,
    /// How often the current candidate is re-checked
    pub recheck_interval: Duration,
    pub watcher: WatcherConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TRACKING_TIMEOUT,
            recheck_interval: Duration::from_secs(30),
            watcher: WatcherConfig::default(),
        }
    }
}

/// Caller side of a tracking session
///
/// `updates` yields each status change and closes after a terminal result
/// or once the session is stopped.
#[derive(Debug)]
pub struct TrackingHandle {
    pub id: TrackingId,
    pub updates: mpsc::UnboundedReceiver<SelfSendResult>,
}

/// Registry entry, owned by the tracker
struct Session {
    address: String,
    cancel: CancellationToken,
    updates: mpsc::UnboundedSender<SelfSendResult>,
}

type Registry = Arc<Mutex<HashMap<TrackingId, Session>>>;

/// Watches for self-send transactions on behalf of callers
pub struct SelfSendTracker<R: ?Sized> {
    indexer: ChainIndexer<R>,
    config: TrackerConfig,
    sessions: Registry,
}

impl<R: BitcoinRpc + ?Sized + 'static> SelfSendTracker<R> {
    pub fn new(rpc: Arc<R>, config: TrackerConfig) -> Self {
        let indexer = ChainIndexer::new(rpc, config.watcher.clone());
        Self {
            indexer,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Start a session; must be called inside a Tokio runtime
    pub fn start_tracking(&self, request: SelfSendRequest) -> Result<TrackingHandle, TrackerError> {
        let validation = validate_self_send_request(&request);
        if !validation.valid {
            return Err(TrackerError::InvalidRequest(
                validation.error.unwrap_or_default(),
            ));
        }

        let id = TrackingId::generate();
        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.default_timeout);
        let (sender, updates) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        self.sessions.lock().insert(
            id.clone(),
            Session {
                address: request.address.clone(),
                cancel: cancel.clone(),
                updates: sender,
            },
        );

        info!(
            target: "reserve::self_send",
            tracking_id = %id,
            address = %request.address,
            min_confirmations = request.min_confirmations,
            timeout_ms = timeout.as_millis() as u64,
            "tracking started"
        );

        let task = SessionTask {
            id: id.clone(),
            address: request.address,
            min_confirmations: request.min_confirmations,
            rpc: self.indexer.rpc().clone(),
            registry: self.sessions.clone(),
            cancel,
            candidate: None,
            last_reported: None,
        };
        let watch = self.indexer.watch_mempool();
        tokio::spawn(task.run(watch, timeout, self.config.recheck_interval));

        Ok(TrackingHandle { id, updates })
    }

    /// Stop a session; returns false if it was not active
    ///
    /// Idempotent. No update is delivered for the session afterwards.
    pub fn stop_tracking(&self, id: &TrackingId) -> bool {
        let removed = self.sessions.lock().remove(id);
        match removed {
            Some(session) => {
                session.cancel.cancel();
                debug!(target: "reserve::self_send", tracking_id = %id, address = %session.address, "tracking stopped");
                true
            }
            None => false,
        }
    }

    /// Number of registered sessions
    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Stop every session
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.sessions.lock().drain().collect();
        for (id, session) in drained {
            session.cancel.cancel();
            debug!(target: "reserve::self_send", tracking_id = %id, "tracking stopped on shutdown");
        }
    }
}

impl<R: ?Sized> Drop for SelfSendTracker<R> {
    fn drop(&mut self) {
        for (_, session) in self.sessions.lock().drain() {
            session.cancel.cancel();
        }
    }
}

enum SessionEvent {
    Diff(MempoolDiff),
    WatcherGone,
    Recheck,
}

/// Outcome of a session step raced against stop and timeout
enum Guarded<T> {
    Done(T),
    Stopped,
    Expired,
}

/// Run `work` until it finishes, the session is stopped or the deadline passes
///
/// Stop is polled before the deadline and both before `work`, so the work
/// never resumes once either has fired.
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    deadline: Pin<&mut Sleep>,
    work: F,
) -> Guarded<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Guarded::Stopped,
        _ = deadline => Guarded::Expired,
        output = work => Guarded::Done(output),
    }
}

async fn next_event(watch: &mut MempoolWatch, recheck: &mut Interval) -> SessionEvent {
    tokio::select! {
        diff = watch.next_diff() => match diff {
            Some(diff) => SessionEvent::Diff(diff),
            None => SessionEvent::WatcherGone,
        },
        _ = recheck.tick() => SessionEvent::Recheck,
    }
}

struct SessionTask<R: ?Sized> {
    id: TrackingId,
    address: String,
    min_confirmations: u32,
    rpc: Arc<R>,
    registry: Registry,
    cancel: CancellationToken,
    /// Txid of the transaction currently being followed
    candidate: Option<String>,
    last_reported: Option<(SelfSendStatus, Option<u32>)>,
}

impl<R: BitcoinRpc + ?Sized> SessionTask<R> {
    async fn run(mut self, mut watch: MempoolWatch, timeout: Duration, recheck_interval: Duration) {
        let cancel = self.cancel.clone();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut recheck = interval_at(Instant::now() + recheck_interval, recheck_interval);
        recheck.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Sweep the watcher's seed so every later arrival shows up as an added diff
        let seed = guarded(&cancel, deadline.as_mut(), watch.initial_snapshot()).await;
        let mut step = match seed {
            Guarded::Done(Some(txids)) => {
                guarded(&cancel, deadline.as_mut(), self.sweep(txids)).await
            }
            Guarded::Done(None) => {
                warn!(target: "reserve::self_send", tracking_id = %self.id, "mempool watcher exited before first sample");
                Guarded::Done(false)
            }
            Guarded::Stopped => Guarded::Stopped,
            Guarded::Expired => Guarded::Expired,
        };

        while let Guarded::Done(true) = step {
            let event = guarded(&cancel, deadline.as_mut(), next_event(&mut watch, &mut recheck)).await;
            step = match event {
                Guarded::Done(SessionEvent::Diff(diff)) => {
                    guarded(&cancel, deadline.as_mut(), self.on_diff(diff)).await
                }
                Guarded::Done(SessionEvent::Recheck) => {
                    guarded(&cancel, deadline.as_mut(), self.recheck()).await
                }
                Guarded::Done(SessionEvent::WatcherGone) => {
                    warn!(target: "reserve::self_send", tracking_id = %self.id, "mempool watcher exited");
                    Guarded::Done(false)
                }
                Guarded::Stopped => Guarded::Stopped,
                Guarded::Expired => Guarded::Expired,
            };
        }

        if let Guarded::Expired = step {
            self.emit(SelfSendResult::expired());
        }

        self.registry.lock().remove(&self.id);
        watch.stop();
        trace!(target: "reserve::self_send", tracking_id = %self.id, "session task finished");
    }

    /// Look for candidates already in the mempool when tracking started
    async fn sweep(&mut self, txids: Vec<String>) -> bool {
        for txid in txids {
            if !self.evaluate(&txid).await {
                return false;
            }
        }
        true
    }

    async fn on_diff(&mut self, diff: MempoolDiff) -> bool {
        for txid in &diff.added {
            if !self.evaluate(txid).await {
                return false;
            }
        }

        // Left the mempool: mined, replaced or evicted
        if let Some(candidate) = self.candidate.clone() {
            if diff.removed.contains(&candidate) {
                return self.evaluate(&candidate).await;
            }
        }
        true
    }

    async fn recheck(&mut self) -> bool {
        match self.candidate.clone() {
            Some(candidate) => self.evaluate(&candidate).await,
            None => true,
        }
    }

    /// Check one txid; returns false once the session has ended
    async fn evaluate(&mut self, txid: &str) -> bool {
        match check_self_send(&*self.rpc, &self.address, txid).await {
            Ok(candidate) => {
                if self.candidate.as_deref() != Some(candidate.txid.as_str()) {
                    debug!(
                        target: "reserve::self_send",
                        tracking_id = %self.id,
                        txid = %candidate.txid,
                        amount_sats = candidate.amount_sats,
                        "following self-send candidate"
                    );
                    self.candidate = Some(candidate.txid.clone());
                }
                let result = candidate.into_result(self.min_confirmations);
                self.emit(result)
            }
            Err(e) if e.is_amount_violation() => {
                self.emit(SelfSendResult::invalid(Some(txid.to_string()), e.to_string()))
            }
            Err(SelfSendCheckError::Rpc(e)) => {
                warn!(target: "reserve::self_send", tracking_id = %self.id, txid, error = %e, "skipping txid after RPC failure");
                true
            }
            Err(e) => {
                trace!(target: "reserve::self_send", tracking_id = %self.id, txid, reason = %e, "not a self-send");
                true
            }
        }
    }

    /// Deliver a result if the session is still registered and the result
    /// differs from the last one; returns false once the session has ended
    fn emit(&mut self, result: SelfSendResult) -> bool {
        let key = (result.status, result.confirmations);
        if self.last_reported == Some(key) {
            return true;
        }

        let mut sessions = self.registry.lock();
        let session = match sessions.get(&self.id) {
            Some(session) => session,
            None => return false,
        };

        self.last_reported = Some(key);
        let event_type = if result.is_terminal() {
            "self_send_finished"
        } else {
            "self_send_update"
        };
        log_self_send_event(event_type, self.id.as_str(), &self.address, &result);

        let terminal = result.is_terminal();
        let delivered = session.updates.send(result).is_ok();

        if terminal || !delivered {
            if let Some(session) = sessions.remove(&self.id) {
                session.cancel.cancel();
            }
            return false;
        }
        true
    }
}
