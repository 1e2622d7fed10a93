//! Blocked set — the in-memory index of blocked evaluations.
//!
//! Holds captured and escaped evaluations, the per-job index that keeps
//! at most one blocked evaluation per job, and the ordered list of
//! superseded duplicates. The store is plain synchronous state; the
//! tracker serializes access to it behind a single lock.

use std::collections::{HashMap, HashSet};

use crate::types::{BlockedStats, EvalId, Evaluation, JobId};

/// Result of offering an evaluation to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The evaluation is now the blocked evaluation for its job.
    Tracked,
    /// The job already had a blocked evaluation; this one was queued
    /// as a duplicate.
    Duplicate,
}

#[derive(Debug, Default)]
pub struct BlockedSet {
    /// Evaluations whose feasibility was bounded to known node classes.
    captured: HashMap<EvalId, Evaluation>,
    /// Evaluations that escaped computed node classes.
    escaped: HashMap<EvalId, Evaluation>,
    /// Jobs with exactly one evaluation in `captured` or `escaped`.
    jobs: HashSet<JobId>,
    /// Superseded evaluations, in arrival order.
    duplicates: Vec<Evaluation>,
    stats: BlockedStats,
}

impl BlockedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `eval`, or queue it as a duplicate if its job is already tracked.
    pub fn block(&mut self, eval: Evaluation) -> BlockOutcome {
        if self.jobs.contains(&eval.job_id) {
            self.duplicates.push(eval);
            return BlockOutcome::Duplicate;
        }

        self.stats.total_blocked += 1;
        self.jobs.insert(eval.job_id.clone());
        if eval.escaped_computed_class {
            self.stats.total_escaped += 1;
            self.escaped.insert(eval.id.clone(), eval);
        } else {
            self.captured.insert(eval.id.clone(), eval);
        }
        BlockOutcome::Tracked
    }

    /// Release every evaluation that could make progress on a capacity
    /// change in `class`.
    ///
    /// All escaped evaluations are released. A captured evaluation stays
    /// only if it recorded `class` as explicitly ineligible; an unseen
    /// class releases it.
    pub fn unblock(&mut self, class: &str) -> Vec<Evaluation> {
        let mut unblocked: Vec<Evaluation> = self.escaped.drain().map(|(_, eval)| eval).collect();

        let released: Vec<EvalId> = self
            .captured
            .iter()
            .filter(|(_, eval)| eval.class_eligibility(class) != Some(false))
            .map(|(id, _)| id.clone())
            .collect();
        for id in released {
            if let Some(eval) = self.captured.remove(&id) {
                unblocked.push(eval);
            }
        }

        for eval in &unblocked {
            self.jobs.remove(&eval.job_id);
        }

        if !unblocked.is_empty() {
            self.stats.total_escaped = 0;
            self.stats.total_blocked -= unblocked.len();
        }
        unblocked
    }

    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }

    /// Drain all queued duplicates, oldest first.
    pub fn take_duplicates(&mut self) -> Vec<Evaluation> {
        std::mem::take(&mut self.duplicates)
    }

    pub fn stats(&self) -> BlockedStats {
        self.stats
    }

    pub fn is_job_tracked(&self, job_id: &str) -> bool {
        self.jobs.contains(job_id)
    }

    pub fn is_blocked(&self, eval_id: &str) -> bool {
        self.captured.contains_key(eval_id) || self.escaped.contains_key(eval_id)
    }

    /// Number of blocked (non-duplicate) evaluations.
    pub fn len(&self) -> usize {
        self.captured.len() + self.escaped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all state, including queued duplicates.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(id: &str, job: &str) -> Evaluation {
        Evaluation::new(id, job)
    }

    fn escaped(id: &str, job: &str) -> Evaluation {
        Evaluation::new(id, job).with_escaped(true)
    }

    fn ids(evals: &[Evaluation]) -> Vec<&str> {
        let mut ids: Vec<&str> = evals.iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    fn assert_counters(set: &BlockedSet) {
        assert_eq!(set.stats().total_blocked, set.captured.len() + set.escaped.len());
        assert_eq!(set.stats().total_escaped, set.escaped.len());
        assert_eq!(set.jobs.len(), set.len());
    }

    #[test]
    fn block_captured_and_escaped() {
        let mut set = BlockedSet::new();
        assert_eq!(set.block(captured("e1", "job-a")), BlockOutcome::Tracked);
        assert_eq!(set.block(escaped("e2", "job-b")), BlockOutcome::Tracked);

        assert_eq!(
            set.stats(),
            BlockedStats {
                total_blocked: 2,
                total_escaped: 1
            }
        );
        assert!(set.is_job_tracked("job-a"));
        assert!(set.is_job_tracked("job-b"));
        assert_counters(&set);
    }

    #[test]
    fn second_eval_for_job_is_duplicate_in_order() {
        let mut set = BlockedSet::new();
        set.block(captured("e1", "job-a"));
        assert_eq!(set.block(escaped("e2", "job-a")), BlockOutcome::Duplicate);
        assert_eq!(set.block(captured("e3", "job-a")), BlockOutcome::Duplicate);

        assert_eq!(set.len(), 1);
        assert!(set.is_blocked("e1"));
        assert_eq!(set.stats().total_escaped, 0);
        assert_counters(&set);

        let dups = set.take_duplicates();
        let order: Vec<&str> = dups.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["e2", "e3"]);
        assert!(!set.has_duplicates());
    }

    #[test]
    fn unblock_skips_explicitly_ineligible_class() {
        let mut set = BlockedSet::new();
        set.block(captured("e1", "job-a").with_class_eligibility("class-a", false));

        assert!(set.unblock("class-a").is_empty());
        assert!(set.is_blocked("e1"));
        assert_counters(&set);
    }

    #[test]
    fn unblock_releases_eligible_and_unseen_classes() {
        let mut set = BlockedSet::new();
        set.block(captured("e1", "job-a").with_class_eligibility("class-a", true));
        set.block(captured("e2", "job-b"));
        set.block(captured("e3", "job-c").with_class_eligibility("class-a", false));

        let released = set.unblock("class-a");
        assert_eq!(ids(&released), vec!["e1", "e2"]);
        assert!(set.is_blocked("e3"));
        assert!(!set.is_job_tracked("job-a"));
        assert!(!set.is_job_tracked("job-b"));
        assert!(set.is_job_tracked("job-c"));
        assert_counters(&set);

        // An unseen class releases the remaining eval.
        let released = set.unblock("class-b");
        assert_eq!(ids(&released), vec!["e3"]);
        assert!(set.is_empty());
        assert_counters(&set);
    }

    #[test]
    fn unblock_always_releases_escaped() {
        let mut set = BlockedSet::new();
        set.block(escaped("e1", "job-a").with_class_eligibility("class-a", false));
        set.block(escaped("e2", "job-b"));

        let released = set.unblock("class-a");
        assert_eq!(ids(&released), vec!["e1", "e2"]);
        assert_eq!(set.stats(), BlockedStats::default());
        assert_counters(&set);
    }

    #[test]
    fn unblock_on_empty_set_is_noop() {
        let mut set = BlockedSet::new();
        assert!(set.unblock("class-a").is_empty());
        assert_eq!(set.stats(), BlockedStats::default());
    }

    #[test]
    fn released_job_can_block_again() {
        let mut set = BlockedSet::new();
        set.block(captured("e1", "job-a"));
        set.unblock("class-a");

        assert_eq!(set.block(captured("e2", "job-a")), BlockOutcome::Tracked);
        assert!(!set.has_duplicates());
        assert_counters(&set);
    }

    #[test]
    fn duplicates_survive_unblock() {
        let mut set = BlockedSet::new();
        set.block(captured("e1", "job-a"));
        set.block(captured("e2", "job-a"));
        set.unblock("class-a");

        assert!(set.is_empty());
        assert_eq!(ids(&set.take_duplicates()), vec!["e2"]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut set = BlockedSet::new();
        set.block(captured("e1", "job-a"));
        set.block(escaped("e2", "job-b"));
        set.block(captured("e3", "job-a"));

        set.reset();
        assert!(set.is_empty());
        assert!(!set.has_duplicates());
        assert_eq!(set.stats(), BlockedStats::default());
        assert_eq!(set.block(captured("e4", "job-a")), BlockOutcome::Tracked);
    }
}
