//! The entity locker facade.

use crate::config::LockProperties;
use crate::error::LockResult;
use crate::guard::EntityGuard;
use crate::normalize::KeyNormalizer;
use crate::session::LockSession;
use crate::stats::StatsSnapshot;
use crate::table::LockTable;
use crate::types::ContextId;
use std::fmt;
use std::sync::Arc;

/// Mutual exclusion scoped to entity keys.
///
/// Keys equal under the configured order share one reentrant lock; other
/// keys are independent. Multi-key operations normalize their keys and take
/// them in the configured order, so concurrent batches cannot deadlock on
/// each other, and they are all-or-nothing: a batch that fails releases
/// whatever it took before reporting.
///
/// The methods here act for the calling thread. Use [`EntityLocker::session`]
/// or [`EntityLocker::session_for`] to act for another context or to make
/// waits cancellable.
///
/// ## Example
///
/// ```rust,ignore
/// let locker = EntityLocker::new(LockProperties::natural(Duration::from_millis(500))?);
///
/// locker.lock(account_id)?;
/// // ... mutate the account ...
/// locker.unlock(account_id)?;
///
/// if locker.try_lock_all_for([from_id, to_id], 100)? {
///     // ... transfer ...
///     locker.unlock_all([from_id, to_id])?;
/// }
/// ```
pub struct EntityLocker<K> {
    properties: LockProperties<K>,
    table: LockTable<K>,
    normalizer: KeyNormalizer<K>,
}

impl<K> EntityLocker<K> {
    /// Creates a locker with the given properties.
    pub fn new(properties: LockProperties<K>) -> Self {
        let order = Arc::clone(properties.key_order());
        Self {
            table: LockTable::new(Arc::clone(&order)),
            normalizer: KeyNormalizer::new(order),
            properties,
        }
    }

    /// The properties this locker was built with.
    pub fn properties(&self) -> &LockProperties<K> {
        &self.properties
    }

    pub(crate) fn table(&self) -> &LockTable<K> {
        &self.table
    }

    pub(crate) fn normalizer(&self) -> &KeyNormalizer<K> {
        &self.normalizer
    }

    /// A session acting for the calling thread.
    pub fn session(&self) -> LockSession<'_, K> {
        LockSession::new(self, ContextId::current())
    }

    /// A session acting for `context`.
    pub fn session_for(&self, context: ContextId) -> LockSession<'_, K> {
        LockSession::new(self, context)
    }

    /// Returns a snapshot of the lock statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.table.stats().snapshot()
    }

    /// Returns true if any context holds `key`.
    pub fn is_locked(&self, key: &K) -> bool {
        self.table.is_locked(key)
    }

    /// Returns the context holding `key`, if any.
    pub fn owner(&self, key: &K) -> Option<ContextId> {
        self.table.owner(key)
    }

    /// Returns true if the calling thread holds `key`.
    pub fn is_held_by_current_thread(&self, key: &K) -> bool {
        self.session().is_held(key)
    }

    /// Number of holds the calling thread has on `key`.
    pub fn hold_count(&self, key: &K) -> u32 {
        self.session().hold_count(key)
    }

    /// Number of keys currently held by anyone.
    pub fn locked_count(&self) -> usize {
        self.table.locked_count()
    }

    /// Releases one hold of `key`. See [`LockSession::unlock`].
    pub fn unlock(&self, key: impl Into<Option<K>>) -> LockResult<()> {
        self.session().unlock(key)
    }

    /// Releases one hold of each key. See [`LockSession::unlock_all`].
    pub fn unlock_all<I, T>(&self, keys: I) -> LockResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        self.session().unlock_all(keys)
    }

    /// See [`LockSession::unlock_all_opt`].
    pub fn unlock_all_opt<I, T>(&self, keys: Option<I>) -> LockResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        self.session().unlock_all_opt(keys)
    }
}

impl<K: Clone> EntityLocker<K> {
    /// Acquires `key`, waiting as long as it takes. See [`LockSession::lock`].
    pub fn lock(&self, key: impl Into<Option<K>>) -> LockResult<()> {
        self.session().lock(key)
    }

    /// Acquires every key. See [`LockSession::lock_all`].
    pub fn lock_all<I, T>(&self, keys: I) -> LockResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        self.session().lock_all(keys)
    }

    /// See [`LockSession::lock_all_opt`].
    pub fn lock_all_opt<I, T>(&self, keys: Option<I>) -> LockResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        self.session().lock_all_opt(keys)
    }

    /// Tries to acquire `key` within the default timeout.
    pub fn try_lock(&self, key: impl Into<Option<K>>) -> LockResult<bool> {
        self.session().try_lock(key)
    }

    /// Tries to acquire `key` within `timeout_millis`.
    pub fn try_lock_for(&self, key: impl Into<Option<K>>, timeout_millis: i64) -> LockResult<bool> {
        self.session().try_lock_for(key, timeout_millis)
    }

    /// Tries to acquire every key within the default timeout.
    pub fn try_lock_all<I, T>(&self, keys: I) -> LockResult<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        self.session().try_lock_all(keys)
    }

    /// See [`LockSession::try_lock_all_opt`].
    pub fn try_lock_all_opt<I, T>(&self, keys: Option<I>) -> LockResult<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        self.session().try_lock_all_opt(keys)
    }

    /// Tries to acquire every key within `timeout_millis` for the batch.
    pub fn try_lock_all_for<I, T>(&self, keys: I, timeout_millis: i64) -> LockResult<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        self.session().try_lock_all_for(keys, timeout_millis)
    }

    /// See [`LockSession::try_lock_all_for_opt`].
    pub fn try_lock_all_for_opt<I, T>(&self, keys: Option<I>, timeout_millis: i64) -> LockResult<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        self.session().try_lock_all_for_opt(keys, timeout_millis)
    }

    /// Acquires `key` and returns a guard releasing it on drop.
    pub fn guard(&self, key: impl Into<Option<K>>) -> LockResult<EntityGuard<'_, K>> {
        self.session().guard(key)
    }

    /// Acquires every key and returns a guard releasing them on drop.
    pub fn guard_all<I, T>(&self, keys: I) -> LockResult<EntityGuard<'_, K>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        self.session().guard_all(keys)
    }

    /// Tries to acquire `key` within `timeout_millis`, returning a guard.
    pub fn try_guard_for(
        &self,
        key: impl Into<Option<K>>,
        timeout_millis: i64,
    ) -> LockResult<Option<EntityGuard<'_, K>>> {
        self.session().try_guard_for(key, timeout_millis)
    }

    /// Tries to acquire every key within `timeout_millis`, returning a guard.
    pub fn try_guard_all_for<I, T>(
        &self,
        keys: I,
        timeout_millis: i64,
    ) -> LockResult<Option<EntityGuard<'_, K>>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        self.session().try_guard_all_for(keys, timeout_millis)
    }
}

impl<K> fmt::Debug for EntityLocker<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityLocker")
            .field("properties", &self.properties)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LockError;
    use std::time::Duration;

    fn create_locker() -> EntityLocker<u64> {
        EntityLocker::new(LockProperties::natural(Duration::from_millis(50)).unwrap())
    }

    #[test]
    fn lock_and_unlock() {
        let locker = create_locker();
        locker.lock(1).unwrap();
        assert!(locker.is_locked(&1));
        assert!(locker.is_held_by_current_thread(&1));
        assert_eq!(locker.owner(&1), Some(ContextId::current()));
        locker.unlock(1).unwrap();
        assert!(!locker.is_locked(&1));
    }

    #[test]
    fn null_key_rejected() {
        let locker = create_locker();
        assert_eq!(locker.lock(None), Err(LockError::NullKey));
        assert_eq!(locker.try_lock(None), Err(LockError::NullKey));
        assert_eq!(locker.try_lock_for(None, 10), Err(LockError::NullKey));
        assert_eq!(locker.unlock(None), Err(LockError::NullKey));
        assert_eq!(locker.locked_count(), 0);
    }

    #[test]
    fn absent_collection_rejected() {
        let locker = create_locker();
        assert_eq!(locker.lock_all_opt(None::<Vec<u64>>), Err(LockError::NullKey));
        assert_eq!(locker.try_lock_all_opt(None::<Vec<u64>>), Err(LockError::NullKey));
        assert_eq!(locker.unlock_all_opt(None::<Vec<u64>>), Err(LockError::NullKey));
        assert_eq!(
            locker.try_lock_all_for_opt(None::<Vec<u64>>, 10),
            Err(LockError::NullKey)
        );
        assert_eq!(
            locker.try_lock_all_for_opt(None::<Vec<u64>>, 0),
            Err(LockError::NullKey)
        );
        assert_eq!(
            locker.try_lock_all_for_opt(Some(vec![1]), 0),
            Err(LockError::invalid_timeout(0))
        );
        assert!(locker.try_lock_all_opt(Some(vec![1, 2])).unwrap());
        assert_eq!(locker.locked_count(), 2);
    }

    #[test]
    fn invalid_timeout_rejected() {
        let locker = create_locker();
        assert_eq!(locker.try_lock_for(1, 0), Err(LockError::invalid_timeout(0)));
        assert_eq!(locker.try_lock_for(1, -1), Err(LockError::invalid_timeout(-1)));
        assert_eq!(
            locker.try_lock_all_for(vec![1, 2], 0),
            Err(LockError::invalid_timeout(0))
        );
        assert!(!locker.is_locked(&1));
    }

    #[test]
    fn empty_batch_succeeds() {
        let locker = create_locker();
        assert!(locker.try_lock_all(Vec::<u64>::new()).unwrap());
        locker.lock_all(vec![None, None]).unwrap();
        locker.unlock_all(Vec::<u64>::new()).unwrap();
    }

    #[test]
    fn guard_releases_on_drop() {
        let locker = create_locker();
        {
            let guard = locker.guard_all(vec![3, 1, 2, 1]).unwrap();
            assert_eq!(guard.keys(), &[1, 2, 3]);
            assert_eq!(locker.locked_count(), 3);
        }
        assert_eq!(locker.locked_count(), 0);
    }

    #[test]
    fn guard_unlock_reports() {
        let locker = create_locker();
        let guard = locker.guard(9).unwrap();
        assert_eq!(guard.context(), ContextId::current());
        guard.unlock().unwrap();
        assert!(!locker.is_locked(&9));
    }

    #[test]
    fn explicit_context_session() {
        let locker = create_locker();
        let task = ContextId::next();
        let session = locker.session_for(task);
        session.lock(4).unwrap();
        assert_eq!(locker.owner(&4), Some(task));
        assert!(!locker.is_held_by_current_thread(&4));

        let err = locker.unlock(4).unwrap_err();
        assert_eq!(err, LockError::ownership_violation(ContextId::current(), task));
        session.unlock(4).unwrap();
        assert!(!locker.is_locked(&4));
    }

    #[test]
    fn rollback_counted_only_when_keys_released() {
        let locker = create_locker();
        let other = locker.session_for(ContextId::next());

        // First key contended: nothing taken, nothing to roll back.
        other.lock(1).unwrap();
        assert!(!locker.try_lock_all_for(vec![1, 2], 10).unwrap());
        assert_eq!(locker.stats().rollbacks, 0);
        assert_eq!(locker.stats().timeouts, 1);
        other.unlock(1).unwrap();

        // Second key contended: key 1 is taken, then released.
        other.lock(2).unwrap();
        assert!(!locker.try_lock_all_for(vec![1, 2], 10).unwrap());
        assert_eq!(locker.stats().rollbacks, 1);
        assert!(!locker.is_locked(&1));
        other.unlock(2).unwrap();
    }
}
