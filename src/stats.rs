//! Pipeline counters
//!
//! Lock-free tallies of per-event outcomes, logged periodically and at
//! shutdown.
//!
//! Created: 2026-10-19

use crate::types::PipelineOutcome;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub events: AtomicU64,
    pub duplicates: AtomicU64,
    pub read_failures: AtomicU64,
    pub ineligible: AtomicU64,
    pub indeterminate: AtomicU64,
    pub build_failures: AtomicU64,
    pub dry_runs: AtomicU64,
    pub confirmed: AtomicU64,
    pub failed: AtomicU64,
    pub feed_restarts: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.feed_restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: &PipelineOutcome) {
        let counter = match outcome {
            PipelineOutcome::Duplicate => &self.duplicates,
            PipelineOutcome::ReadFailed { .. } => &self.read_failures,
            PipelineOutcome::Ineligible { .. } => &self.ineligible,
            PipelineOutcome::Indeterminate { .. } => &self.indeterminate,
            PipelineOutcome::BuildFailed { .. } => &self.build_failures,
            PipelineOutcome::DryRun { .. } => &self.dry_runs,
            PipelineOutcome::Confirmed { .. } => &self.confirmed,
            PipelineOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        write!(
            f,
            "events={} dup={} read_fail={} ineligible={} indeterminate={} build_fail={} dry_run={} confirmed={} failed={} feed_restarts={}",
            get(&self.events),
            get(&self.duplicates),
            get(&self.read_failures),
            get(&self.ineligible),
            get(&self.indeterminate),
            get(&self.build_failures),
            get(&self.dry_runs),
            get(&self.confirmed),
            get(&self.failed),
            get(&self.feed_restarts),
        )
    }
}
