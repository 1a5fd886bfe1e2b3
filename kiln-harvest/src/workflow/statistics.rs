//! Harvest run statistics
//!
//! Workers update [`RunStatistics`] concurrently; the pipeline turns it into a
//! [`HarvestReport`] once every worker has finished.

use super::Rejection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Counters shared by the worker pool
#[derive(Debug, Default)]
pub struct RunStatistics {
    dispatched: AtomicUsize,
    committed: AtomicUsize,
    rejections: Mutex<Vec<Rejection>>,
}

impl RunStatistics {
    pub fn record_dispatch(&self) -> usize {
        self.dispatched.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_commit(&self) -> usize {
        self.committed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_rejection(&self, rejection: Rejection) {
        self.rejections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(rejection);
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn committed(&self) -> usize {
        self.committed.load(Ordering::Relaxed)
    }

    /// Build the report; call once every worker has finished
    pub fn report(&self, candidates: usize, cap_reached: bool, elapsed: Duration) -> HarvestReport {
        let mut rejected = self
            .rejections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        rejected.sort_by_key(|r| r.object_id);

        HarvestReport {
            candidates,
            dispatched: self.dispatched(),
            committed: self.committed(),
            rejected,
            cap_reached,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Outcome of one harvest run
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    /// Unique identifiers gathered from search
    pub candidates: usize,
    /// Identifiers a worker started processing
    pub dispatched: usize,
    /// Entries added to the store
    pub committed: usize,
    /// Rejected identifiers, ordered by identifier
    pub rejected: Vec<Rejection>,
    /// Run stopped because the store reached its maximum
    pub cap_reached: bool,
    pub elapsed_ms: u64,
}

impl HarvestReport {
    /// Rejection counts keyed by reason text
    pub fn rejections_by_reason(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for rejection in &self.rejected {
            *counts.entry(rejection.reason.to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} committed, {} rejected, {} of {} candidates dispatched{}",
            self.committed,
            self.rejected.len(),
            self.dispatched,
            self.candidates,
            if self.cap_reached { " (entry cap reached)" } else { "" }
        )
    }
}
