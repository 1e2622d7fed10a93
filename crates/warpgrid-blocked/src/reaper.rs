//! Duplicate reaper — cancels superseded blocked evaluations.
//!
//! Only one blocked evaluation is kept per job; later ones are parked as
//! duplicates. The reaper drains them in a loop, marks them cancelled,
//! and hands them to a callback that persists the new status.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::BlockedConfig;
use crate::error::BlockedResult;
use crate::tracker::BlockedEvals;
use crate::types::{EvalStatus, Evaluation};

/// Status description set on cancelled duplicates.
pub const DUPLICATE_CANCEL_DESCRIPTION: &str = "existing blocked evaluation exists for job";

/// Callback invoked with each batch of cancelled duplicates.
pub type CancelCallback = Arc<dyn Fn(Vec<Evaluation>) -> BoxFuture + Send + Sync>;

type BoxFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
>;

pub struct DuplicateReaper {
    tracker: BlockedEvals,
    on_cancel: CancelCallback,
    /// How long each round waits for a duplicate to show up.
    wait: Duration,
}

impl DuplicateReaper {
    pub fn new(tracker: BlockedEvals, on_cancel: CancelCallback) -> Self {
        Self {
            tracker,
            on_cancel,
            wait: Duration::from_secs(1),
        }
    }

    /// Create a reaper that waits `duplicate_wait` per round.
    pub fn with_config(
        tracker: BlockedEvals,
        on_cancel: CancelCallback,
        config: &BlockedConfig,
    ) -> BlockedResult<Self> {
        Ok(Self::new(tracker, on_cancel).with_wait(config.duplicate_wait_period()?))
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Set how long each round parks in `get_duplicates`.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Drain and cancel one round of duplicates.
    ///
    /// Returns the number of evaluations handed to the callback.
    pub async fn reap_once(&self) -> anyhow::Result<usize> {
        let dups = self.tracker.get_duplicates(self.wait).await;
        self.cancel(dups).await
    }

    /// Mark `dups` cancelled and hand them to the callback.
    async fn cancel(&self, dups: Vec<Evaluation>) -> anyhow::Result<usize> {
        if dups.is_empty() {
            return Ok(0);
        }

        let cancelled: Vec<Evaluation> = dups.into_iter().map(cancel_duplicate).collect();
        let count = cancelled.len();
        (self.on_cancel)(cancelled).await?;
        debug!(count, "duplicate blocked evaluations cancelled");
        Ok(count)
    }

    /// Reap duplicates until `shutdown` changes.
    ///
    /// Shutdown only interrupts the wait for duplicates. A batch already
    /// drained from the tracker is always handed to the callback.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(wait_ms = self.wait.as_millis() as u64, "duplicate reaper started");

        loop {
            let dups = tokio::select! {
                dups = self.tracker.get_duplicates(self.wait) => dups,
                _ = shutdown.changed() => {
                    info!("duplicate reaper shutting down");
                    break;
                }
            };

            if let Err(e) = self.cancel(dups).await {
                error!(error = %e, "failed to cancel duplicate blocked evaluations");
            }
        }
    }
}

fn cancel_duplicate(mut eval: Evaluation) -> Evaluation {
    eval.status = EvalStatus::Cancelled;
    eval.status_description = DUPLICATE_CANCEL_DESCRIPTION.to_string();
    eval
}
