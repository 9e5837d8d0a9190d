//! Writer statistics.
//!
//! Counters describe what the writer has done, never what is queued: the
//! writer deliberately exposes no queue depth.
//!
//! ```rust
//! use onewriter_core::ExclusiveWriter;
//! use onewriter_store::{LogStore, MemoryBackend};
//!
//! let writer: ExclusiveWriter<LogStore<MemoryBackend>> = ExclusiveWriter::new();
//! writer.submit_detached(|_| Ok::<_, String>(())).unwrap();
//!
//! let stats = writer.stats().snapshot();
//! assert_eq!(stats.submitted, 1);
//! assert_eq!(stats.succeeded, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Writer counters.
///
/// All counters are atomic and may be read while tasks are running.
#[derive(Debug, Default)]
pub struct WriterStats {
    /// Tasks handed to the queue.
    submitted: AtomicU64,
    /// Tasks whose work returned `Ok` (and, if scoped, committed).
    succeeded: AtomicU64,
    /// Tasks that returned an error of any kind.
    failed: AtomicU64,
    /// Tasks whose work panicked.
    panicked: AtomicU64,
    /// Submissions refused before reaching the queue.
    rejected: AtomicU64,
    /// Activation claims won by a worker.
    activations: AtomicU64,
    /// Spawned workers that lost the activation claim.
    lost_claims: AtomicU64,
}

/// A point-in-time copy of [`WriterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Tasks handed to the queue.
    pub submitted: u64,
    /// Tasks that succeeded.
    pub succeeded: u64,
    /// Tasks that failed.
    pub failed: u64,
    /// Tasks that panicked.
    pub panicked: u64,
    /// Submissions refused before reaching the queue.
    pub rejected: u64,
    /// Activation claims won.
    pub activations: u64,
    /// Activation claims lost.
    pub lost_claims: u64,
}

impl StatsSnapshot {
    /// Tasks that have finished one way or another.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }
}

impl WriterStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lost_claim(&self) {
        self.lost_claims.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of tasks handed to the queue.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Returns the number of tasks that succeeded.
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Returns the number of tasks that failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Returns the number of tasks that panicked.
    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    /// Returns the number of submissions refused before queueing.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Returns how many times a worker won the activation claim.
    ///
    /// Each idle-to-active transition adds exactly one.
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    /// Returns how many spawned workers lost the claim and exited.
    pub fn lost_claims(&self) -> u64 {
        self.lost_claims.load(Ordering::Relaxed)
    }

    /// Returns a copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            panicked: self.panicked(),
            rejected: self.rejected(),
            activations: self.activations(),
            lost_claims: self.lost_claims(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        assert_eq!(WriterStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn snapshot_reflects_records() {
        let stats = WriterStats::new();
        stats.record_submitted();
        stats.record_submitted();
        stats.record_succeeded();
        stats.record_panicked();
        stats.record_activation();
        stats.record_lost_claim();

        let snap = stats.snapshot();
        assert_eq!(snap.submitted, 2);
        assert_eq!(snap.completed(), 2);
        assert_eq!(snap.activations, 1);
        assert_eq!(snap.lost_claims, 1);
        assert_eq!(snap.rejected, 0);
    }
}
