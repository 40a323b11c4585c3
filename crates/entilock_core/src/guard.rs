//! Scoped lock guards.

use crate::error::LockResult;
use crate::table::LockTable;
use crate::types::ContextId;
use std::fmt;
use tracing::warn;

/// Holds one or more entity locks and releases them when dropped.
///
/// Keys are released newest first, mirroring acquisition order. A release
/// failing during drop is logged; use [`EntityGuard::unlock`] to observe
/// the error instead.
#[must_use = "the locks are released as soon as the guard is dropped"]
pub struct EntityGuard<'a, K> {
    table: &'a LockTable<K>,
    context: ContextId,
    keys: Vec<K>,
}

impl<'a, K> EntityGuard<'a, K> {
    pub(crate) fn new(table: &'a LockTable<K>, context: ContextId, keys: Vec<K>) -> Self {
        Self {
            table,
            context,
            keys,
        }
    }

    /// The keys held by this guard, in acquisition order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// The context owning the held keys.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Releases the keys now, reporting the first failure.
    ///
    /// Every key is attempted even if an earlier release fails.
    pub fn unlock(mut self) -> LockResult<()> {
        let keys = std::mem::take(&mut self.keys);
        let mut result = Ok(());
        for key in keys.iter().rev() {
            let released = self.table.release(key, self.context);
            if result.is_ok() {
                result = released;
            }
        }
        result
    }
}

impl<K> Drop for EntityGuard<'_, K> {
    fn drop(&mut self) {
        for key in self.keys.iter().rev() {
            if let Err(error) = self.table.release(key, self.context) {
                warn!(context = %self.context, %error, "failed to release guarded entity lock");
            }
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for EntityGuard<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityGuard")
            .field("context", &self.context)
            .field("keys", &self.keys)
            .finish()
    }
}
