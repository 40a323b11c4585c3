//! Locker statistics.
//!
//! Counters are updated by the lock table and the facade as operations
//! complete, and can be read at any time without blocking lockers.
//!
//! # Usage
//!
//! ```rust,ignore
//! let locker = EntityLocker::new(LockProperties::natural(Duration::from_secs(1))?);
//! locker.lock(7u64)?;
//! locker.unlock(7u64)?;
//!
//! let stats = locker.stats();
//! println!("Acquisitions: {}", stats.acquisitions);
//! println!("Timeouts: {}", stats.timeouts);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Live lock statistics.
///
/// All counters are monotonically increasing.
#[derive(Debug, Default)]
pub struct LockStats {
    /// Acquisitions that took a free key.
    acquisitions: AtomicU64,
    /// Acquisitions that re-entered a key already held by the caller.
    reentrant_acquisitions: AtomicU64,
    /// Acquisitions that had to park at least once.
    contended: AtomicU64,
    /// Acquisitions abandoned at the deadline.
    timeouts: AtomicU64,
    /// Acquisitions abandoned because of cancellation.
    cancellations: AtomicU64,
    /// Releases that decremented a hold.
    releases: AtomicU64,
    /// Multi-key batches rolled back.
    rollbacks: AtomicU64,
    /// Unlock attempts by a non-owner.
    ownership_violations: AtomicU64,
}

impl LockStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_acquisition(&self) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reentrant(&self) {
        self.reentrant_acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_contended(&self) {
        self.contended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ownership_violation(&self) {
        self.ownership_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            reentrant_acquisitions: self.reentrant_acquisitions.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            ownership_violations: self.ownership_violations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`LockStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Acquisitions that took a free key.
    pub acquisitions: u64,
    /// Acquisitions that re-entered a key already held by the caller.
    pub reentrant_acquisitions: u64,
    /// Acquisitions that had to park at least once.
    pub contended: u64,
    /// Acquisitions abandoned at the deadline.
    pub timeouts: u64,
    /// Acquisitions abandoned because of cancellation.
    pub cancellations: u64,
    /// Releases that decremented a hold.
    pub releases: u64,
    /// Multi-key batches rolled back.
    pub rollbacks: u64,
    /// Unlock attempts by a non-owner.
    pub ownership_violations: u64,
}

impl StatsSnapshot {
    /// Holds granted, fresh or reentrant.
    pub fn total_holds(&self) -> u64 {
        self.acquisitions + self.reentrant_acquisitions
    }

    /// Fraction of acquisitions that had to wait.
    pub fn contention_ratio(&self) -> f64 {
        let total = self.total_holds() + self.timeouts + self.cancellations;
        if total == 0 {
            0.0
        } else {
            self.contended as f64 / total as f64
        }
    }
}
