//! Locker configuration.

use crate::error::{LockError, LockResult};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Total order over keys, shared by the lock table and the normalizer.
///
/// Keys comparing [`Ordering::Equal`] are the same entity.
pub type KeyOrder<K> = Arc<dyn Fn(&K, &K) -> Ordering + Send + Sync>;

/// Immutable configuration of an [`EntityLocker`](crate::EntityLocker).
///
/// Built once through [`LockProperties::builder`]; invalid settings are
/// rejected by [`LockPropertiesBuilder::build`], never at call time.
pub struct LockProperties<K> {
    default_timeout: Duration,
    key_order: KeyOrder<K>,
}

impl<K> LockProperties<K> {
    /// Starts building lock properties.
    #[must_use]
    pub fn builder() -> LockPropertiesBuilder<K> {
        LockPropertiesBuilder::default()
    }

    /// Properties ordering keys by their [`Ord`] implementation.
    pub fn natural(default_timeout: Duration) -> LockResult<Self>
    where
        K: Ord + 'static,
    {
        Self::builder()
            .default_timeout(default_timeout)
            .natural_order()
            .build()
    }

    /// Timeout used by `try_lock` and `try_lock_all`.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// The configured key order.
    #[must_use]
    pub fn key_order(&self) -> &KeyOrder<K> {
        &self.key_order
    }

    /// Compares two keys with the configured order.
    pub fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.key_order)(a, b)
    }
}

impl<K> Clone for LockProperties<K> {
    fn clone(&self) -> Self {
        Self {
            default_timeout: self.default_timeout,
            key_order: Arc::clone(&self.key_order),
        }
    }
}

impl<K> fmt::Debug for LockProperties<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockProperties")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`LockProperties`].
pub struct LockPropertiesBuilder<K> {
    default_timeout: Option<Duration>,
    key_order: Option<KeyOrder<K>>,
}

impl<K> Default for LockPropertiesBuilder<K> {
    fn default() -> Self {
        Self {
            default_timeout: None,
            key_order: None,
        }
    }
}

impl<K> LockPropertiesBuilder<K> {
    /// Sets the default timeout.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Sets the default timeout in milliseconds.
    ///
    /// Zero or negative values are accepted here and rejected by `build`.
    #[must_use]
    pub fn default_timeout_millis(mut self, millis: i64) -> Self {
        let millis = u64::try_from(millis).unwrap_or(0);
        self.default_timeout = Some(Duration::from_millis(millis));
        self
    }

    /// Sets the key order.
    #[must_use]
    pub fn key_order<F>(mut self, order: F) -> Self
    where
        F: Fn(&K, &K) -> Ordering + Send + Sync + 'static,
    {
        self.key_order = Some(Arc::new(order));
        self
    }

    /// Orders keys by their [`Ord`] implementation.
    #[must_use]
    pub fn natural_order(self) -> Self
    where
        K: Ord + 'static,
    {
        self.key_order(<K as Ord>::cmp)
    }

    /// Validates the settings and builds the properties.
    pub fn build(self) -> LockResult<LockProperties<K>> {
        let default_timeout = self
            .default_timeout
            .ok_or_else(|| LockError::invalid_config("default timeout is required"))?;
        if default_timeout.is_zero() {
            return Err(LockError::invalid_config("default timeout must be positive"));
        }
        let key_order = self
            .key_order
            .ok_or_else(|| LockError::invalid_config("key order is required"))?;

        Ok(LockProperties {
            default_timeout,
            key_order,
        })
    }
}

impl<K> fmt::Debug for LockPropertiesBuilder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockPropertiesBuilder")
            .field("default_timeout", &self.default_timeout)
            .field("key_order", &self.key_order.is_some())
            .finish()
    }
}
