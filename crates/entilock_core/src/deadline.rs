//! Timeout arithmetic for blocking acquisitions.
//!
//! A [`Deadline`] turns a relative wait into an absolute instant once, so
//! that a batch of acquisitions can share it instead of restarting the
//! clock for every key.

use crate::error::{LockError, LockResult};
use std::time::{Duration, Instant};

/// Absolute point in time by which an acquisition must succeed.
///
/// An unbounded deadline never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    #[must_use]
    pub const fn never() -> Self {
        Self { at: None }
    }

    /// A deadline `timeout` from now.
    ///
    /// Timeouts too large to represent as an instant are treated as
    /// unbounded.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    /// A deadline `millis` milliseconds from now.
    ///
    /// Fails with [`LockError::InvalidTimeout`] if `millis` is not positive.
    pub fn from_millis(millis: i64) -> LockResult<Self> {
        let millis = u64::try_from(millis)
            .ok()
            .filter(|&m| m > 0)
            .ok_or(LockError::invalid_timeout(millis))?;
        Ok(Self::after(Duration::from_millis(millis)))
    }

    /// Returns the absolute instant, or `None` if unbounded.
    #[must_use]
    pub const fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Returns true if this deadline can expire.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.at.is_some()
    }

    /// Time left before expiry, or `None` if unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Returns true once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn never_does_not_expire() {
        let deadline = Deadline::never();
        assert!(!deadline.is_bounded());
        assert!(!deadline.is_expired());
        assert_eq!(deadline.remaining(), None);
    }

    #[test]
    fn zero_timeout_is_already_expired() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn remaining_shrinks() {
        let deadline = Deadline::after(Duration::from_secs(3600));
        let first = deadline.remaining().unwrap();
        thread::sleep(Duration::from_millis(5));
        let second = deadline.remaining().unwrap();
        assert!(second < first);
        assert!(first <= Duration::from_secs(3600));
        assert!(!deadline.is_expired());
    }

    #[test]
    fn expires_after_timeout() {
        let deadline = Deadline::after(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(20));
        assert!(deadline.is_expired());
    }

    #[test]
    fn huge_timeout_is_unbounded() {
        assert_eq!(Deadline::after(Duration::MAX), Deadline::never());
    }

    #[test]
    fn from_millis_rejects_non_positive() {
        assert_eq!(
            Deadline::from_millis(0),
            Err(LockError::InvalidTimeout { millis: 0 })
        );
        assert_eq!(
            Deadline::from_millis(-1),
            Err(LockError::InvalidTimeout { millis: -1 })
        );
        assert!(Deadline::from_millis(10).unwrap().is_bounded());
    }
}
