//! Core type definitions for EntiLock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh context IDs, shared by threads and explicit tokens.
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_CONTEXT: ContextId = ContextId::next();
}

/// Identifier of an execution context that can own entity locks.
///
/// The locker only compares context IDs for equality. Every OS thread is
/// assigned a distinct ID the first time it calls [`ContextId::current`].
/// Tasks, fibers or requests that are not pinned to a thread can mint their
/// own token with [`ContextId::next`] and pass it through a session.
///
/// IDs handed out by [`ContextId::next`] and [`ContextId::current`] never
/// collide. IDs built with [`ContextId::new`] are taken verbatim and may.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub u64);

impl ContextId {
    /// Creates a context ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a context ID that no other context has been given.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the context ID of the calling thread.
    #[must_use]
    pub fn current() -> Self {
        CURRENT_CONTEXT.with(|id| *id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx:{}", self.0)
    }
}
