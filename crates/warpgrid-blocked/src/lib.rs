//! warpgrid-blocked — blocked evaluation tracking for the WarpGrid scheduler.
//!
//! When the scheduler cannot place an evaluation because no eligible node
//! has spare capacity, it hands the evaluation to `BlockedEvals`. The
//! tracker holds it until a capacity change on a node class that could
//! satisfy it is signalled, then releases it to the downstream eval queue.
//!
//! # Architecture
//!
//! ```text
//! BlockedEvals (leader only, Clone)
//!   ├── block(eval) ──────────► BlockedSet
//!   │                             ├── captured (bounded to node classes)
//!   │                             ├── escaped  (any node may fit)
//!   │                             ├── jobs     (one blocked eval per job)
//!   │                             └── duplicates
//!   ├── unblock(class) ─► bounded mpsc ─► unblock worker
//!   │                                       └── EvalQueue::enqueue_all(batch)
//!   ├── get_duplicates(timeout) ◄── DuplicateReaper (cancels superseded evals)
//!   ├── flush() — new generation of stop / wake-up / unblock channels
//!   └── emit_stats() ─► MetricsSink (GaugeRegistry)
//! ```
//!
//! # Release rules
//!
//! Escaped evaluations are released on every capacity change. A captured
//! evaluation is released unless it recorded the changed class as
//! explicitly ineligible; a class it never saw releases it too.

pub mod config;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod reaper;
pub mod store;
pub mod tracker;
pub mod types;

pub use config::BlockedConfig;
pub use error::{BlockedError, BlockedResult};
pub use metrics::{GaugeRegistry, MetricsSink};
pub use queue::EvalQueue;
pub use reaper::{CancelCallback, DuplicateReaper};
pub use store::{BlockOutcome, BlockedSet};
pub use tracker::BlockedEvals;
pub use types::*;
