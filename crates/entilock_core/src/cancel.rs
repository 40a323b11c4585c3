//! Cancellation of blocked acquisitions.
//!
//! A [`CancelToken`] is handed to a session before it blocks. Cancelling the
//! token from any thread wakes every wait parked under it; the waiter then
//! deregisters and the facade rolls back any partial batch before returning
//! [`LockError::Cancelled`](crate::LockError::Cancelled).
//!
//! Cancellation is sticky: once cancelled, a token fails every later wait
//! it is attached to. Acquisitions that do not need to wait still succeed.

use crate::table::LockEntry;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

const DEFAULT_REASON: &str = "cancelled";

/// Cloneable cancellation signal shared between a waiter and its canceller.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
    /// Entries that waiters under this token are parked on.
    parked: Mutex<Vec<(u64, Arc<LockEntry>)>>,
    next_ticket: AtomicU64,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token with a generic reason.
    pub fn cancel(&self) {
        self.cancel_with(DEFAULT_REASON);
    }

    /// Cancels the token, recording `reason` if it is the first cancellation.
    pub fn cancel_with(&self, reason: impl Into<String>) {
        {
            let mut slot = self.inner.reason.lock();
            if slot.is_none() {
                *slot = Some(reason.into());
            }
        }
        self.inner.cancelled.store(true, Ordering::SeqCst);

        // Snapshot first: `wake_all` takes entry locks, which must never be
        // acquired while holding `parked`.
        let parked: Vec<Arc<LockEntry>> = self
            .inner
            .parked
            .lock()
            .iter()
            .map(|(_, entry)| Arc::clone(entry))
            .collect();
        for entry in parked {
            entry.wake_all();
        }
    }

    /// Returns true once the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The reason given to the first cancellation.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    /// Registers a parked waiter; the returned ticket deregisters it.
    pub(crate) fn park(&self, entry: &Arc<LockEntry>) -> u64 {
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.inner.parked.lock().push((ticket, Arc::clone(entry)));
        ticket
    }

    pub(crate) fn unpark(&self, ticket: u64) {
        self.inner.parked.lock().retain(|(t, _)| *t != ticket);
    }

    pub(crate) fn parked_count(&self) -> usize {
        self.inner.parked.lock().len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("parked", &self.parked_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContextId;

    #[test]
    fn new_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);
    }

    #[test]
    fn first_reason_wins() {
        let token = CancelToken::new();
        token.cancel_with("shutdown");
        token.cancel_with("again");
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("shutdown"));
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some(DEFAULT_REASON));
    }

    #[test]
    fn park_and_unpark() {
        let token = CancelToken::new();
        let entry = Arc::new(LockEntry::owned_by(ContextId::new(1)));
        let a = token.park(&entry);
        let b = token.park(&entry);
        assert_ne!(a, b);
        assert_eq!(token.parked_count(), 2);
        token.unpark(a);
        assert_eq!(token.parked_count(), 1);
        token.unpark(b);
        assert_eq!(token.parked_count(), 0);
    }
}
