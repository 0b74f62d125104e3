//! Processor counters, shared by every worker of one processor.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct ProcessorStats {
    leased: AtomicU64,
    succeeded: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    failures: AtomicU64,
    conflicts: AtomicU64,
    store_errors: AtomicU64,
}

/// Point-in-time copy of `ProcessorStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorStatsSnapshot {
    /// Items leased by this processor.
    pub leased: u64,
    /// Released with `commit`.
    pub succeeded: u64,
    /// Released with `requeueAfter` (includes failures).
    pub retried: u64,
    /// Released with `deadLetter`.
    pub dead_lettered: u64,
    /// Handler errors, panics and uninterpretable results.
    pub failures: u64,
    /// Releases rejected because the lease was stale.
    pub conflicts: u64,
    /// Failed store calls (lease or release).
    pub store_errors: u64,
}

impl ProcessorStats {
    pub(crate) fn record_leased(&self) {
        self.leased.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProcessorStatsSnapshot {
        ProcessorStatsSnapshot {
            leased: self.leased.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}
