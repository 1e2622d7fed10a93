//! Blocked evaluation tracker.
//!
//! `BlockedEvals` holds evaluations that could not be placed and requeues
//! them once capacity that could satisfy them appears. Capacity changes
//! arrive through `unblock`, are buffered on a bounded channel, and are
//! applied one at a time by a single background worker.
//!
//! Every `flush` starts a new generation: the stop signal, the duplicate
//! wake-up, and the unblock channel are replaced, and a worker from an
//! older generation exits without touching the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Notify, RwLock};
use tracing::{debug, info};

use crate::config::{BlockedConfig, DEFAULT_UNBLOCK_BUFFER};
use crate::error::BlockedResult;
use crate::metrics::MetricsSink;
use crate::queue::EvalQueue;
use crate::store::{BlockOutcome, BlockedSet};
use crate::types::{BlockedStats, Evaluation};

const TOTAL_BLOCKED_GAUGE: [&str; 3] = ["warpgrid", "blocked_evals", "total_blocked"];
const TOTAL_ESCAPED_GAUGE: [&str; 3] = ["warpgrid", "blocked_evals", "total_escaped"];

/// State guarded by the tracker lock.
struct Inner {
    /// Only the cluster leader tracks blocked evaluations.
    enabled: bool,
    /// An unblock worker for the current generation is alive.
    running: bool,
    /// Bumped on every flush.
    generation: u64,
    set: BlockedSet,
    unblock_tx: mpsc::Sender<String>,
    /// Receiver for the current generation until a worker claims it.
    unblock_rx: Option<mpsc::Receiver<String>>,
    duplicate_notify: Arc<Notify>,
    stop_tx: watch::Sender<bool>,
}

impl Inner {
    fn new(unblock_buffer: usize) -> Self {
        let (unblock_tx, unblock_rx) = mpsc::channel(unblock_buffer);
        let (stop_tx, _) = watch::channel(false);
        Self {
            enabled: false,
            running: false,
            generation: 0,
            set: BlockedSet::new(),
            unblock_tx,
            unblock_rx: Some(unblock_rx),
            duplicate_notify: Arc::new(Notify::new()),
            stop_tx,
        }
    }
}

/// Tracks evaluations blocked on cluster capacity.
///
/// Cheap to clone; clones share the same store and worker.
#[derive(Clone)]
pub struct BlockedEvals {
    inner: Arc<RwLock<Inner>>,
    queue: Arc<dyn EvalQueue>,
    unblock_buffer: usize,
    /// Interval used by `report_stats`.
    stats_period: Duration,
}

impl BlockedEvals {
    /// Create a disabled tracker that releases evaluations into `queue`.
    pub fn new(queue: Arc<dyn EvalQueue>) -> Self {
        Self::build(queue, DEFAULT_UNBLOCK_BUFFER, Duration::from_secs(1))
    }

    /// Create a disabled tracker sized and paced by `config`.
    ///
    /// Fails if the config does not validate.
    pub fn with_config(
        queue: Arc<dyn EvalQueue>,
        config: &BlockedConfig,
    ) -> BlockedResult<Self> {
        config.validate()?;
        Ok(Self::build(queue, config.unblock_buffer, config.stats_period()?))
    }

    fn build(queue: Arc<dyn EvalQueue>, unblock_buffer: usize, stats_period: Duration) -> Self {
        let unblock_buffer = unblock_buffer.max(1);
        Self {
            inner: Arc::new(RwLock::new(Inner::new(unblock_buffer))),
            queue,
            unblock_buffer,
            stats_period,
        }
    }

    /// Interval `report_stats` publishes at.
    pub fn stats_period(&self) -> Duration {
        self.stats_period
    }

    pub async fn enabled(&self) -> bool {
        self.inner.read().await.enabled
    }

    /// Enable or disable tracking.
    ///
    /// Enabling starts the unblock worker if none is running. Disabling
    /// flushes all state, so followers never hold blocked evaluations.
    pub async fn set_enabled(&self, enabled: bool) {
        {
            let mut inner = self.inner.write().await;
            inner.enabled = enabled;
            if enabled && !inner.running {
                self.start_worker(&mut inner);
            }
        }

        if !enabled {
            self.flush().await;
        }
    }

    fn start_worker(&self, inner: &mut Inner) {
        let unblock_rx = match inner.unblock_rx.take() {
            Some(rx) => rx,
            None => {
                let (tx, rx) = mpsc::channel(self.unblock_buffer);
                inner.unblock_tx = tx;
                rx
            }
        };
        inner.running = true;

        let generation = inner.generation;
        let stop_rx = inner.stop_tx.subscribe();
        let state = self.inner.clone();
        let queue = self.queue.clone();
        tokio::spawn(async move {
            run_unblock_loop(state, queue, unblock_rx, stop_rx, generation).await;
        });

        info!(generation, "blocked eval unblock worker started");
    }

    /// Track an evaluation until capacity that could satisfy it appears.
    ///
    /// If the job already has a blocked evaluation, `eval` is queued as a
    /// duplicate for `get_duplicates`. No-op while disabled.
    pub async fn block(&self, eval: Evaluation) {
        let mut inner = self.inner.write().await;
        if !inner.enabled {
            return;
        }

        let eval_id = eval.id.clone();
        let job_id = eval.job_id.clone();
        match inner.set.block(eval) {
            BlockOutcome::Tracked => {
                debug!(%eval_id, %job_id, "evaluation blocked");
            }
            BlockOutcome::Duplicate => {
                debug!(%eval_id, %job_id, "job already blocked, evaluation queued as duplicate");
                inner.duplicate_notify.notify_one();
            }
        }
    }

    /// Signal a capacity change on `computed_class`.
    ///
    /// Waits if the unblock channel is full. No-op while disabled.
    pub async fn unblock(&self, computed_class: &str) {
        let unblock_tx = {
            let inner = self.inner.read().await;
            if !inner.enabled {
                return;
            }
            inner.unblock_tx.clone()
        };

        if unblock_tx.send(computed_class.to_string()).await.is_err() {
            debug!(%computed_class, "unblock channel closed by flush, notification dropped");
        }
    }

    /// Return all queued duplicate evaluations.
    ///
    /// If none are queued, waits until one arrives, `timeout` elapses, or
    /// the tracker is flushed. A zero `timeout` waits indefinitely. Returns
    /// an empty list on timeout or flush.
    pub async fn get_duplicates(&self, timeout: Duration) -> Vec<Evaluation> {
        let deadline = (!timeout.is_zero()).then(|| tokio::time::Instant::now() + timeout);

        loop {
            let (notify, mut stop_rx) = {
                let mut inner = self.inner.write().await;
                if inner.set.has_duplicates() {
                    return inner.set.take_duplicates();
                }
                (inner.duplicate_notify.clone(), inner.stop_tx.subscribe())
            };

            let expired = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = stop_rx.changed() => return Vec::new(),
                _ = expired => return Vec::new(),
                _ = notify.notified() => continue,
            }
        }
    }

    /// Reset the tracker to its empty initial state.
    ///
    /// Stops the running worker, releases any `get_duplicates` waiter, and
    /// installs fresh channels for the next enable cycle.
    pub async fn flush(&self) {
        let mut inner = self.inner.write().await;
        self.flush_locked(&mut inner);
    }

    fn flush_locked(&self, inner: &mut Inner) {
        if inner.running {
            let _ = inner.stop_tx.send(true);
            inner.running = false;
        }

        let (unblock_tx, unblock_rx) = mpsc::channel(self.unblock_buffer);
        let (stop_tx, _) = watch::channel(false);
        inner.generation += 1;
        inner.set.reset();
        inner.unblock_tx = unblock_tx;
        inner.unblock_rx = Some(unblock_rx);
        inner.duplicate_notify = Arc::new(Notify::new());
        inner.stop_tx = stop_tx;

        info!(generation = inner.generation, "blocked evals flushed");
    }

    /// Snapshot of the tracker counters.
    pub async fn stats(&self) -> BlockedStats {
        self.inner.read().await.set.stats()
    }

    /// Publish stats to `sink` at the configured `stats_period` until
    /// `shutdown` changes.
    pub async fn report_stats(
        &self,
        sink: Arc<dyn MetricsSink>,
        shutdown: watch::Receiver<bool>,
    ) {
        self.emit_stats(self.stats_period, sink, shutdown).await
    }

    /// Publish stats to `sink` every `period` until `shutdown` changes.
    pub async fn emit_stats(
        &self,
        period: Duration,
        sink: Arc<dyn MetricsSink>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(period) => {
                    let stats = self.stats().await;
                    sink.set_gauge(&TOTAL_BLOCKED_GAUGE, stats.total_blocked as f32);
                    sink.set_gauge(&TOTAL_ESCAPED_GAUGE, stats.total_escaped as f32);
                }
                _ = shutdown.changed() => {
                    debug!("blocked eval stats emitter shutting down");
                    break;
                }
            }
        }
    }
}

/// Apply capacity-change notifications one at a time until stopped.
async fn run_unblock_loop(
    state: Arc<RwLock<Inner>>,
    queue: Arc<dyn EvalQueue>,
    mut unblock_rx: mpsc::Receiver<String>,
    mut stop_rx: watch::Receiver<bool>,
    generation: u64,
) {
    loop {
        tokio::select! {
            biased;

            _ = stop_rx.changed() => break,
            class = unblock_rx.recv() => {
                let Some(class) = class else { break };

                let mut inner = state.write().await;
                // A flush raced with this notification.
                if inner.generation != generation {
                    break;
                }

                let unblocked = inner.set.unblock(&class);
                if !unblocked.is_empty() {
                    debug!(
                        computed_class = %class,
                        count = unblocked.len(),
                        "evaluations unblocked"
                    );
                    // Enqueue under the lock so a concurrent block for the
                    // same job is seen as new only after the release.
                    queue.enqueue_all(unblocked);
                }
            }
        }
    }

    info!(generation, "blocked eval unblock worker stopped");
}
