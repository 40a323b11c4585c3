//! Error types for EntiLock.

use crate::types::ContextId;
use thiserror::Error;

/// Result type for locking operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors that can occur in locking operations.
///
/// A timeout is not an error: `try_lock*` methods report it as `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// A key or key collection was absent.
    #[error("key must not be absent")]
    NullKey,

    /// An explicit timeout was zero or negative.
    #[error("timeout must be positive, got {millis} ms")]
    InvalidTimeout {
        /// The rejected timeout in milliseconds.
        millis: i64,
    },

    /// Unlock was attempted by a context that does not own the lock.
    #[error("{caller} is not the owner of the lock (owned by {owner})")]
    OwnershipViolation {
        /// The context that attempted the unlock.
        caller: ContextId,
        /// The context that currently owns the lock.
        owner: ContextId,
    },

    /// A blocking acquisition was cancelled.
    #[error("lock acquisition cancelled: {reason}")]
    Cancelled {
        /// Reason supplied by whoever cancelled the wait.
        reason: String,
    },

    /// Lock properties failed validation.
    #[error("invalid lock configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl LockError {
    /// Creates an invalid timeout error.
    pub fn invalid_timeout(millis: i64) -> Self {
        Self::InvalidTimeout { millis }
    }

    /// Creates an ownership violation error.
    pub fn ownership_violation(caller: ContextId, owner: ContextId) -> Self {
        Self::OwnershipViolation { caller, owner }
    }

    /// Creates a cancellation error.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if this error reports a cancelled wait.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
