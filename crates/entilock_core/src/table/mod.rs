//! Per-key lock table.
//!
//! The table owns one [`LockEntry`] per held key. Each entry pairs the
//! owner and reentrancy count with its own condition variable, so parking
//! and waking is scoped to a single key:
//!
//! - **Acquire**: insert a fresh entry, re-enter an owned one, or park
//!   until the entry is free, the deadline passes, or the wait is cancelled
//! - **Release**: decrement the hold count; at zero clear the owner and wake
//!   every waiter in the same critical section

mod entry;
mod key;
mod lock_table;

pub(crate) use entry::LockEntry;
pub use lock_table::{AcquireOutcome, LockTable};
