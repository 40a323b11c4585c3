//! Key to lock-entry table.

use crate::cancel::CancelToken;
use crate::config::KeyOrder;
use crate::deadline::Deadline;
use crate::error::{LockError, LockResult};
use crate::stats::LockStats;
use crate::table::entry::LockEntry;
use crate::table::key::{KeyView, Probe, TableKey};
use crate::types::ContextId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Outcome of a single-key acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller now holds the key (freshly or reentrantly).
    Acquired,
    /// The deadline passed before the key became free.
    TimedOut,
    /// The wait was cancelled through its token.
    Cancelled,
}

type Slots<K> = BTreeMap<TableKey<K>, Arc<LockEntry>>;

/// Concurrent mapping from key to lock entry.
///
/// Slots live in a `BTreeMap` ordered by the configured [`KeyOrder`], so a
/// key is found by the same relation the normalizer sorts and dedups with,
/// in logarithmic time.
/// The structural mutex is only held to look up, insert or remove a slot;
/// waiting happens on the entry's own condition variable, so waiters for
/// different keys never contend.
///
/// Lock order: structural mutex, then entry mutex, then the cancel token's
/// registry.
pub struct LockTable<K> {
    slots: Mutex<Slots<K>>,
    order: KeyOrder<K>,
    stats: LockStats,
}

impl<K> LockTable<K> {
    /// Creates an empty table using `order` to identify keys.
    pub fn new(order: KeyOrder<K>) -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
            order,
            stats: LockStats::new(),
        }
    }

    fn find(&self, slots: &Slots<K>, key: &K) -> Option<Arc<LockEntry>> {
        let probe = Probe::new(key, &self.order);
        slots.get(&probe as &dyn KeyView<K>).map(Arc::clone)
    }

    fn entry(&self, key: &K) -> Option<Arc<LockEntry>> {
        let slots = self.slots.lock();
        self.find(&slots, key)
    }

    /// Releases one hold of `key` by `context`.
    ///
    /// Releasing a key that nobody holds is a no-op. Releasing a key held by
    /// another context fails with [`LockError::OwnershipViolation`] and leaves
    /// the entry untouched. When the last hold goes, the owner is cleared and
    /// every waiter is woken in the same critical section; the slot is
    /// removed if nobody is waiting for it.
    pub fn release(&self, key: &K, context: ContextId) -> LockResult<()> {
        let mut slots = self.slots.lock();
        let Some(entry) = self.find(&slots, key) else {
            return Ok(());
        };
        let mut state = entry.lock();

        match state.owner {
            None => return Ok(()),
            Some(owner) if owner != context => {
                self.stats.record_ownership_violation();
                warn!(%context, %owner, "unlock attempted by non-owner");
                return Err(LockError::ownership_violation(context, owner));
            }
            Some(_) => {}
        }

        state.holds -= 1;
        self.stats.record_release();
        if state.holds > 0 {
            trace!(%context, holds = state.holds, "entity lock hold released");
            return Ok(());
        }

        state.owner = None;
        if state.waiters == 0 {
            let probe = Probe::new(key, &self.order);
            slots.remove(&probe as &dyn KeyView<K>);
        }
        entry.released().notify_all();
        trace!(%context, waiters = state.waiters, "entity lock released");
        Ok(())
    }

    /// Returns the owner of `key`, if any.
    pub fn owner(&self, key: &K) -> Option<ContextId> {
        self.entry(key).and_then(|entry| entry.lock().owner)
    }

    /// Returns how many holds `context` has on `key`.
    pub fn holds(&self, key: &K, context: ContextId) -> u32 {
        self.entry(key)
            .map(|entry| {
                let state = entry.lock();
                if state.owner == Some(context) {
                    state.holds
                } else {
                    0
                }
            })
            .unwrap_or(0)
    }

    /// Returns true if some context holds `key`.
    pub fn is_locked(&self, key: &K) -> bool {
        self.owner(key).is_some()
    }

    /// Number of keys currently held.
    pub fn locked_count(&self) -> usize {
        let slots = self.slots.lock();
        slots
            .values()
            .filter(|entry| entry.lock().owner.is_some())
            .count()
    }

    /// Number of slots in the table, including free slots with parked
    /// waiters.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Live statistics for this table.
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }
}

impl<K: Clone> LockTable<K> {
    /// Acquires `key` for `context`, waiting until `deadline` at most.
    ///
    /// The fast path inserts a fresh entry owned by the caller. A caller that
    /// already owns the key gets another hold. Otherwise the caller parks on
    /// the entry and re-checks ownership every time it wakes; all waiters are
    /// woken on release and race for the key, in no particular order.
    ///
    /// `cancel`, when given, aborts the wait once it is cancelled. A waiter
    /// that gives up is deregistered before this returns.
    pub fn acquire(
        &self,
        key: &K,
        context: ContextId,
        deadline: Deadline,
        cancel: Option<&CancelToken>,
    ) -> AcquireOutcome {
        let mut slots = self.slots.lock();
        let entry = match self.find(&slots, key) {
            Some(entry) => entry,
            None => {
                slots.insert(
                    TableKey::new(key.clone(), Arc::clone(&self.order)),
                    Arc::new(LockEntry::owned_by(context)),
                );
                self.stats.record_acquisition();
                trace!(%context, "entity lock acquired");
                return AcquireOutcome::Acquired;
            }
        };

        let mut state = entry.lock();
        match state.owner {
            Some(owner) if owner == context => {
                state.holds += 1;
                self.stats.record_reentrant();
                trace!(%context, holds = state.holds, "entity lock re-entered");
                return AcquireOutcome::Acquired;
            }
            None => {
                state.claim(context);
                self.stats.record_acquisition();
                trace!(%context, "free entity lock claimed");
                return AcquireOutcome::Acquired;
            }
            Some(_) => {}
        }

        // Registered while the structural mutex is still held, so release
        // cannot drop the slot out from under us.
        state.waiters += 1;
        drop(slots);
        let ticket = cancel.map(|token| token.park(&entry));
        self.stats.record_contended();
        debug!(%context, owner = ?state.owner, "waiting for entity lock");

        let outcome = loop {
            if state.owner.is_none() {
                state.claim(context);
                break AcquireOutcome::Acquired;
            }
            if cancel.is_some_and(CancelToken::is_cancelled) {
                break AcquireOutcome::Cancelled;
            }
            if deadline.is_expired() {
                break AcquireOutcome::TimedOut;
            }
            match deadline.instant() {
                None => entry.released().wait(&mut state),
                Some(at) => {
                    let _ = entry.released().wait_until(&mut state, at);
                }
            }
        };
        state.waiters -= 1;
        drop(state);

        if let (Some(token), Some(ticket)) = (cancel, ticket) {
            token.unpark(ticket);
        }

        match outcome {
            AcquireOutcome::Acquired => {
                self.stats.record_acquisition();
                debug!(%context, "entity lock acquired after wait");
            }
            AcquireOutcome::TimedOut => {
                self.stats.record_timeout();
                debug!(%context, "entity lock wait timed out");
            }
            AcquireOutcome::Cancelled => {
                self.stats.record_cancellation();
                debug!(%context, "entity lock wait cancelled");
            }
        }
        outcome
    }
}

impl<K> fmt::Debug for LockTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockTable")
            .field("slots", &self.slot_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn create_table() -> Arc<LockTable<u32>> {
        Arc::new(LockTable::new(Arc::new(|a: &u32, b: &u32| a.cmp(b))))
    }

    #[test]
    fn fast_path_acquire_and_release() {
        let table = create_table();
        let me = ContextId::next();

        assert_eq!(
            table.acquire(&1, me, Deadline::never(), None),
            AcquireOutcome::Acquired
        );
        assert_eq!(table.owner(&1), Some(me));
        assert_eq!(table.holds(&1, me), 1);

        table.release(&1, me).unwrap();
        assert_eq!(table.owner(&1), None);
        assert_eq!(table.slot_count(), 0);
    }

    #[test]
    fn reentrant_holds_count() {
        let table = create_table();
        let me = ContextId::next();

        for _ in 0..3 {
            assert_eq!(
                table.acquire(&5, me, Deadline::never(), None),
                AcquireOutcome::Acquired
            );
        }
        assert_eq!(table.holds(&5, me), 3);

        table.release(&5, me).unwrap();
        table.release(&5, me).unwrap();
        assert!(table.is_locked(&5));
        table.release(&5, me).unwrap();
        assert!(!table.is_locked(&5));

        let snap = table.stats().snapshot();
        assert_eq!(snap.acquisitions, 1);
        assert_eq!(snap.reentrant_acquisitions, 2);
        assert_eq!(snap.releases, 3);
    }

    #[test]
    fn release_unheld_is_noop() {
        let table = create_table();
        table.release(&9, ContextId::next()).unwrap();
        assert_eq!(table.stats().snapshot().releases, 0);
    }

    #[test]
    fn release_by_non_owner_fails() {
        let table = create_table();
        let owner = ContextId::next();
        let other = ContextId::next();
        table.acquire(&1, owner, Deadline::never(), None);

        let err = table.release(&1, other).unwrap_err();
        assert_eq!(err, LockError::ownership_violation(other, owner));
        assert_eq!(table.holds(&1, owner), 1);
    }

    #[test]
    fn contended_acquire_times_out() {
        let table = create_table();
        let owner = ContextId::next();
        table.acquire(&1, owner, Deadline::never(), None);

        let start = Instant::now();
        let outcome = table.acquire(
            &1,
            ContextId::next(),
            Deadline::after(Duration::from_millis(30)),
            None,
        );
        assert_eq!(outcome, AcquireOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(table.owner(&1), Some(owner));
        assert_eq!(table.stats().snapshot().timeouts, 1);
    }

    #[test]
    fn waiter_takes_key_after_release() {
        let table = create_table();
        let owner = ContextId::next();
        table.acquire(&1, owner, Deadline::never(), None);

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let me = ContextId::current();
                tx.send(me).unwrap();
                let outcome = table.acquire(&1, me, Deadline::never(), None);
                (me, outcome)
            })
        };

        let waiter_id = rx.recv().unwrap();
        thread::sleep(Duration::from_millis(20));
        table.release(&1, owner).unwrap();

        let (me, outcome) = waiter.join().unwrap();
        assert_eq!(me, waiter_id);
        assert_eq!(outcome, AcquireOutcome::Acquired);
        assert_eq!(table.owner(&1), Some(waiter_id));
    }

    #[test]
    fn cancelled_waiter_deregisters() {
        let table = create_table();
        let owner = ContextId::next();
        table.acquire(&1, owner, Deadline::never(), None);

        let token = CancelToken::new();
        let waiter = {
            let table = Arc::clone(&table);
            let token = token.clone();
            thread::spawn(move || table.acquire(&1, ContextId::next(), Deadline::never(), Some(&token)))
        };

        while token.parked_count() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        token.cancel_with("test");

        assert_eq!(waiter.join().unwrap(), AcquireOutcome::Cancelled);
        assert_eq!(token.parked_count(), 0);
        assert_eq!(table.owner(&1), Some(owner));

        table.release(&1, owner).unwrap();
        assert_eq!(table.slot_count(), 0);
    }

    #[test]
    fn keys_are_independent() {
        let table = create_table();
        let a = ContextId::next();
        let b = ContextId::next();
        assert_eq!(
            table.acquire(&1, a, Deadline::never(), None),
            AcquireOutcome::Acquired
        );
        assert_eq!(
            table.acquire(&2, b, Deadline::after(Duration::from_millis(1)), None),
            AcquireOutcome::Acquired
        );
        assert_eq!(table.locked_count(), 2);
    }

    #[test]
    fn many_keys_in_descending_order() {
        let table = create_table();
        let me = ContextId::next();
        const KEYS: u32 = 100_000;

        let start = Instant::now();
        for key in (0..KEYS).rev() {
            assert_eq!(
                table.acquire(&key, me, Deadline::never(), None),
                AcquireOutcome::Acquired
            );
        }
        assert_eq!(table.slot_count(), KEYS as usize);
        assert_eq!(table.holds(&0, me), 1);
        assert_eq!(table.holds(&(KEYS - 1), me), 1);

        for key in (0..KEYS).rev() {
            table.release(&key, me).unwrap();
        }
        assert_eq!(table.slot_count(), 0);
        // Linear inserts took seconds at this size.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn comparator_defines_slot_identity() {
        let table: LockTable<String> = LockTable::new(Arc::new(|a: &String, b: &String| {
            a.to_lowercase().cmp(&b.to_lowercase())
        }));
        let me = ContextId::next();
        table.acquire(&"Order-7".to_string(), me, Deadline::never(), None);
        assert_eq!(table.owner(&"ORDER-7".to_string()), Some(me));
        table.release(&"order-7".to_string(), me).unwrap();
        assert_eq!(table.slot_count(), 0);
    }
}
