//! Domain types for blocked evaluation tracking.
//!
//! An `Evaluation` is produced by the scheduler; the tracker only reads
//! its identity, job, and the feasibility metadata computed against
//! node classes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for an evaluation.
pub type EvalId = String;

/// Unique identifier for a job.
pub type JobId = String;

/// Identifier of a computed node class.
pub type ComputedClass = String;

/// Lifecycle status of an evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvalStatus {
    Blocked,
    Pending,
    Cancelled,
}

/// A unit of scheduling work tied to a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub id: EvalId,
    pub job_id: JobId,
    pub status: EvalStatus,
    /// Human-readable reason for the current status.
    #[serde(default)]
    pub status_description: String,
    /// Feasibility could not be bounded to specific node classes.
    #[serde(default)]
    pub escaped_computed_class: bool,
    /// Per-class feasibility verdict. A missing class was never seen
    /// while feasibility was computed.
    #[serde(default)]
    pub class_eligibility: HashMap<ComputedClass, bool>,
}

impl Evaluation {
    /// Create a blocked evaluation with no class eligibility recorded.
    pub fn new(id: impl Into<EvalId>, job_id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            job_id: job_id.into(),
            status: EvalStatus::Blocked,
            status_description: String::new(),
            escaped_computed_class: false,
            class_eligibility: HashMap::new(),
        }
    }

    pub fn with_escaped(mut self, escaped: bool) -> Self {
        self.escaped_computed_class = escaped;
        self
    }

    pub fn with_class_eligibility(
        mut self,
        class: impl Into<ComputedClass>,
        eligible: bool,
    ) -> Self {
        self.class_eligibility.insert(class.into(), eligible);
        self
    }

    /// Recorded verdict for `class`, or `None` if it was never observed.
    pub fn class_eligibility(&self, class: &str) -> Option<bool> {
        self.class_eligibility.get(class).copied()
    }
}

/// Point-in-time counters for the tracker.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockedStats {
    /// Blocked evaluations, captured and escaped.
    pub total_blocked: usize,
    /// Blocked evaluations that escaped computed node classes.
    pub total_escaped: usize,
}
