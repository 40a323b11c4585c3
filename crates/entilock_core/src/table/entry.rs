//! Per-key lock state.

use crate::types::ContextId;
use parking_lot::{Condvar, Mutex, MutexGuard};

/// Lock state for a single key.
///
/// The table keeps an entry while the key is owned or while at least one
/// waiter is parked on it. An entry without an owner is free and goes to
/// whichever waiter re-checks it first.
#[derive(Debug)]
pub(crate) struct LockEntry {
    state: Mutex<EntryState>,
    released: Condvar,
}

#[derive(Debug)]
pub(crate) struct EntryState {
    /// Current owner, `None` once the last hold is released.
    pub(crate) owner: Option<ContextId>,
    /// Reentrant holds of the owner.
    pub(crate) holds: u32,
    /// Waiters parked on `released`.
    pub(crate) waiters: usize,
}

impl EntryState {
    /// Gives the entry to `context` with a single hold.
    pub(crate) fn claim(&mut self, context: ContextId) {
        debug_assert!(self.owner.is_none());
        self.owner = Some(context);
        self.holds = 1;
    }
}

impl LockEntry {
    /// Creates an entry already owned by `context`.
    pub(crate) fn owned_by(context: ContextId) -> Self {
        Self {
            state: Mutex::new(EntryState {
                owner: Some(context),
                holds: 1,
                waiters: 0,
            }),
            released: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock()
    }

    pub(crate) fn released(&self) -> &Condvar {
        &self.released
    }

    /// Wakes every waiter so that each re-checks its exit conditions.
    ///
    /// The state mutex is taken first so that a waiter between its check
    /// and its park cannot miss the notification.
    pub(crate) fn wake_all(&self) {
        let _state = self.state.lock();
        self.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_entry_has_one_hold() {
        let entry = LockEntry::owned_by(ContextId::new(3));
        let state = entry.lock();
        assert_eq!(state.owner, Some(ContextId::new(3)));
        assert_eq!(state.holds, 1);
        assert_eq!(state.waiters, 0);
    }

    #[test]
    fn claim_after_release() {
        let entry = LockEntry::owned_by(ContextId::new(1));
        let mut state = entry.lock();
        state.owner = None;
        state.holds = 0;
        state.claim(ContextId::new(2));
        assert_eq!(state.owner, Some(ContextId::new(2)));
        assert_eq!(state.holds, 1);
    }
}
