//! Downstream queue that receives unblocked evaluations.

use tokio::sync::mpsc;
use tracing::warn;

use crate::types::Evaluation;

/// Accepts evaluations released by the tracker for re-scheduling.
///
/// Called while the tracker holds its store lock, so implementations
/// must not block or call back into the tracker.
pub trait EvalQueue: Send + Sync {
    fn enqueue_all(&self, evals: Vec<Evaluation>);
}

impl EvalQueue for mpsc::UnboundedSender<Vec<Evaluation>> {
    fn enqueue_all(&self, evals: Vec<Evaluation>) {
        let count = evals.len();
        if self.send(evals).is_err() {
            warn!(count, "eval queue receiver dropped, unblocked evaluations discarded");
        }
    }
}
