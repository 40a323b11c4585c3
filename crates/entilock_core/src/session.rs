//! Lock operations bound to one execution context.

use crate::cancel::CancelToken;
use crate::deadline::Deadline;
use crate::error::{LockError, LockResult};
use crate::guard::EntityGuard;
use crate::locker::EntityLocker;
use crate::table::AcquireOutcome;
use crate::types::ContextId;
use tracing::{debug, warn};

/// A view of an [`EntityLocker`] acting for one [`ContextId`].
///
/// Every operation of the locker is available here. Sessions are the way to
/// lock on behalf of an explicit context (a task or request that is not tied
/// to a thread) and to make blocking waits cancellable:
///
/// ```rust,ignore
/// let token = CancelToken::new();
/// let session = locker.session().with_cancel(token.clone());
/// // from another thread: token.cancel_with("shutdown");
/// match session.lock_all([order_id, customer_id]) {
///     Err(LockError::Cancelled { reason }) => { /* nothing is held */ }
///     other => other?,
/// }
/// ```
///
/// Sessions borrow the locker and are cheap to create.
#[derive(Debug)]
pub struct LockSession<'a, K> {
    locker: &'a EntityLocker<K>,
    context: ContextId,
    cancel: Option<CancelToken>,
}

impl<'a, K> LockSession<'a, K> {
    pub(crate) fn new(locker: &'a EntityLocker<K>, context: ContextId) -> Self {
        Self {
            locker,
            context,
            cancel: None,
        }
    }

    /// Makes blocking waits of this session cancellable through `token`.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The context this session acts for.
    #[must_use]
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Returns true if this session's context holds `key`.
    pub fn is_held(&self, key: &K) -> bool {
        self.hold_count(key) > 0
    }

    /// Number of holds this session's context has on `key`.
    pub fn hold_count(&self, key: &K) -> u32 {
        self.locker.table().holds(key, self.context)
    }

    /// Releases one hold of `key`.
    ///
    /// Unlocking a key nobody holds is a no-op.
    pub fn unlock(&self, key: impl Into<Option<K>>) -> LockResult<()> {
        let key = key.into().ok_or(LockError::NullKey)?;
        self.locker.table().release(&key, self.context)
    }

    /// Releases one hold of each key, in normalized order.
    ///
    /// Stops at the first ownership violation; keys before it stay released.
    pub fn unlock_all<I, T>(&self, keys: I) -> LockResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let keys = self.locker.normalizer().normalize(keys);
        self.release_all(&keys)
    }

    /// [`unlock_all`](Self::unlock_all) for a collection that may be absent.
    pub fn unlock_all_opt<I, T>(&self, keys: Option<I>) -> LockResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let keys = self.locker.normalizer().normalize_opt(keys)?;
        self.release_all(&keys)
    }

    fn release_all(&self, keys: &[K]) -> LockResult<()> {
        let table = self.locker.table();
        for key in keys {
            table.release(key, self.context)?;
        }
        Ok(())
    }

    fn cancelled(&self) -> LockError {
        let reason = self
            .cancel
            .as_ref()
            .and_then(CancelToken::reason)
            .unwrap_or_else(|| "cancelled".to_string());
        LockError::cancelled(reason)
    }

    /// Releases a partially acquired batch, newest first.
    fn rollback(&self, acquired: &[K]) {
        let table = self.locker.table();
        for key in acquired.iter().rev() {
            if let Err(error) = table.release(key, self.context) {
                warn!(context = %self.context, %error, "rollback release failed");
            }
        }
        if !acquired.is_empty() {
            table.stats().record_rollback();
            debug!(context = %self.context, released = acquired.len(), "multi-key acquisition rolled back");
        }
    }
}

impl<'a, K: Clone> LockSession<'a, K> {
    fn acquire(&self, key: &K, deadline: Deadline) -> AcquireOutcome {
        self.locker
            .table()
            .acquire(key, self.context, deadline, self.cancel.as_ref())
    }

    /// Acquires normalized `keys` in order against one shared deadline.
    ///
    /// Returns `Ok(false)` on timeout and `Err(Cancelled)` on cancellation;
    /// either way no key of the batch is left held.
    fn acquire_batch(&self, keys: &[K], deadline: Deadline) -> LockResult<bool> {
        for (index, key) in keys.iter().enumerate() {
            match self.acquire(key, deadline) {
                AcquireOutcome::Acquired => {}
                AcquireOutcome::TimedOut => {
                    self.rollback(&keys[..index]);
                    return Ok(false);
                }
                AcquireOutcome::Cancelled => {
                    self.rollback(&keys[..index]);
                    return Err(self.cancelled());
                }
            }
        }
        Ok(true)
    }

    fn lock_normalized(&self, keys: &[K]) -> LockResult<()> {
        while !self.acquire_batch(keys, Deadline::never())? {}
        Ok(())
    }

    fn default_deadline(&self) -> Deadline {
        Deadline::after(self.locker.properties().default_timeout())
    }

    /// Acquires `key`, waiting as long as it takes.
    ///
    /// Fails with [`LockError::NullKey`] for an absent key and with
    /// [`LockError::Cancelled`] if the session's token fires while waiting.
    pub fn lock(&self, key: impl Into<Option<K>>) -> LockResult<()> {
        let key = key.into().ok_or(LockError::NullKey)?;
        loop {
            match self.acquire(&key, Deadline::never()) {
                AcquireOutcome::Acquired => return Ok(()),
                AcquireOutcome::Cancelled => return Err(self.cancelled()),
                AcquireOutcome::TimedOut => {}
            }
        }
    }

    /// Acquires every key, waiting as long as it takes.
    ///
    /// Absent keys are skipped and duplicates collapse. Keys are taken in
    /// the configured order; on cancellation the keys already taken are
    /// released in reverse order before the error is returned.
    pub fn lock_all<I, T>(&self, keys: I) -> LockResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let keys = self.locker.normalizer().normalize(keys);
        self.lock_normalized(&keys)
    }

    /// [`lock_all`](Self::lock_all) for a collection that may be absent.
    pub fn lock_all_opt<I, T>(&self, keys: Option<I>) -> LockResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let keys = self.locker.normalizer().normalize_opt(keys)?;
        self.lock_normalized(&keys)
    }

    /// Tries to acquire `key` within the default timeout.
    ///
    /// Returns `Ok(false)` only when the timeout expires.
    pub fn try_lock(&self, key: impl Into<Option<K>>) -> LockResult<bool> {
        let key = key.into().ok_or(LockError::NullKey)?;
        self.try_acquire(&key, self.default_deadline())
    }

    /// Tries to acquire `key` within `timeout_millis`.
    ///
    /// Fails with [`LockError::InvalidTimeout`] if `timeout_millis <= 0`.
    pub fn try_lock_for(&self, key: impl Into<Option<K>>, timeout_millis: i64) -> LockResult<bool> {
        let key = key.into().ok_or(LockError::NullKey)?;
        let deadline = Deadline::from_millis(timeout_millis)?;
        self.try_acquire(&key, deadline)
    }

    fn try_acquire(&self, key: &K, deadline: Deadline) -> LockResult<bool> {
        match self.acquire(key, deadline) {
            AcquireOutcome::Acquired => Ok(true),
            AcquireOutcome::TimedOut => Ok(false),
            AcquireOutcome::Cancelled => Err(self.cancelled()),
        }
    }

    /// Tries to acquire every key within the default timeout.
    ///
    /// The timeout covers the whole batch, not each key. On timeout the keys
    /// already taken are released in reverse order and `Ok(false)` is
    /// returned.
    pub fn try_lock_all<I, T>(&self, keys: I) -> LockResult<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let deadline = self.default_deadline();
        let keys = self.locker.normalizer().normalize(keys);
        self.acquire_batch(&keys, deadline)
    }

    /// [`try_lock_all`](Self::try_lock_all) for a collection that may be
    /// absent.
    pub fn try_lock_all_opt<I, T>(&self, keys: Option<I>) -> LockResult<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let keys = self.locker.normalizer().normalize_opt(keys)?;
        self.acquire_batch(&keys, self.default_deadline())
    }

    /// Tries to acquire every key within `timeout_millis` for the batch.
    pub fn try_lock_all_for<I, T>(&self, keys: I, timeout_millis: i64) -> LockResult<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let deadline = Deadline::from_millis(timeout_millis)?;
        let keys = self.locker.normalizer().normalize(keys);
        self.acquire_batch(&keys, deadline)
    }

    /// [`try_lock_all_for`](Self::try_lock_all_for) for a collection that
    /// may be absent.
    pub fn try_lock_all_for_opt<I, T>(&self, keys: Option<I>, timeout_millis: i64) -> LockResult<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let keys = self.locker.normalizer().normalize_opt(keys)?;
        let deadline = Deadline::from_millis(timeout_millis)?;
        self.acquire_batch(&keys, deadline)
    }

    /// Acquires `key` and returns a guard that releases it on drop.
    pub fn guard(&self, key: impl Into<Option<K>>) -> LockResult<EntityGuard<'a, K>> {
        let key = key.into().ok_or(LockError::NullKey)?;
        self.lock(key.clone())?;
        Ok(EntityGuard::new(self.locker.table(), self.context, vec![key]))
    }

    /// Acquires every key and returns a guard that releases them on drop.
    pub fn guard_all<I, T>(&self, keys: I) -> LockResult<EntityGuard<'a, K>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let keys = self.locker.normalizer().normalize(keys);
        self.lock_normalized(&keys)?;
        Ok(EntityGuard::new(self.locker.table(), self.context, keys))
    }

    /// Tries to acquire `key` within `timeout_millis`, returning a guard on
    /// success and `None` on timeout.
    pub fn try_guard_for(
        &self,
        key: impl Into<Option<K>>,
        timeout_millis: i64,
    ) -> LockResult<Option<EntityGuard<'a, K>>> {
        let key = key.into().ok_or(LockError::NullKey)?;
        let deadline = Deadline::from_millis(timeout_millis)?;
        Ok(self
            .try_acquire(&key, deadline)?
            .then(|| EntityGuard::new(self.locker.table(), self.context, vec![key])))
    }

    /// Tries to acquire every key within `timeout_millis` for the batch,
    /// returning a guard on success and `None` on timeout.
    pub fn try_guard_all_for<I, T>(
        &self,
        keys: I,
        timeout_millis: i64,
    ) -> LockResult<Option<EntityGuard<'a, K>>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let deadline = Deadline::from_millis(timeout_millis)?;
        let keys = self.locker.normalizer().normalize(keys);
        Ok(self
            .acquire_batch(&keys, deadline)?
            .then(|| EntityGuard::new(self.locker.table(), self.context, keys)))
    }
}
