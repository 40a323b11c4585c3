//! Canonical ordering of multi-key requests.

use crate::config::KeyOrder;
use crate::error::{LockError, LockResult};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Filters, sorts and deduplicates key collections.
///
/// Every multi-key operation acquires its keys in the order produced here.
/// Because all callers share one order, two batches that overlap always
/// contend on their shared keys in the same sequence, which rules out
/// lock-ordering deadlocks between them.
pub struct KeyNormalizer<K> {
    order: KeyOrder<K>,
}

impl<K> KeyNormalizer<K> {
    /// Creates a normalizer for `order`.
    pub fn new(order: KeyOrder<K>) -> Self {
        Self { order }
    }

    /// Drops absent keys, then sorts and deduplicates the rest.
    ///
    /// Keys comparing equal collapse to the first one seen.
    pub fn normalize<I, T>(&self, keys: I) -> Vec<K>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        let mut keys: Vec<K> = keys
            .into_iter()
            .filter_map(|key| -> Option<K> { key.into() })
            .collect();
        keys.sort_by(|a, b| (self.order)(a, b));
        keys.dedup_by(|later, earlier| (self.order)(earlier, later) == Ordering::Equal);
        keys
    }

    /// Like [`normalize`](Self::normalize) for a collection that may itself
    /// be absent, which fails with [`LockError::NullKey`].
    pub fn normalize_opt<I, T>(&self, keys: Option<I>) -> LockResult<Vec<K>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Option<K>>,
    {
        keys.map(|keys| self.normalize(keys))
            .ok_or(LockError::NullKey)
    }
}

impl<K> Clone for KeyNormalizer<K> {
    fn clone(&self) -> Self {
        Self {
            order: Arc::clone(&self.order),
        }
    }
}

impl<K> fmt::Debug for KeyNormalizer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyNormalizer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn natural() -> KeyNormalizer<u32> {
        KeyNormalizer::new(Arc::new(|a: &u32, b: &u32| a.cmp(b)))
    }

    #[test]
    fn sorts_and_dedups() {
        assert_eq!(natural().normalize(vec![3, 1, 2, 3, 1]), vec![1, 2, 3]);
    }

    #[test]
    fn filters_absent_keys() {
        let keys = vec![Some(4), None, Some(2), None];
        assert_eq!(natural().normalize(keys), vec![2, 4]);
    }

    #[test]
    fn empty_collection() {
        assert!(natural().normalize(Vec::<u32>::new()).is_empty());
    }

    #[test]
    fn absent_collection_is_null_key() {
        assert_eq!(
            natural().normalize_opt(None::<Vec<u32>>),
            Err(LockError::NullKey)
        );
        assert_eq!(natural().normalize_opt(Some(vec![2, 1])), Ok(vec![1, 2]));
    }

    #[test]
    fn custom_order_defines_equality() {
        let normalizer: KeyNormalizer<String> = KeyNormalizer::new(Arc::new(|a: &String, b: &String| {
            a.to_lowercase().cmp(&b.to_lowercase())
        }));
        let keys = vec!["b".to_string(), "A".to_string(), "a".to_string()];
        assert_eq!(normalizer.normalize(keys), vec!["A".to_string(), "b".to_string()]);
    }

    proptest! {
        #[test]
        fn output_is_strictly_increasing(keys in prop::collection::vec(prop::option::of(0u32..50), 0..40)) {
            let normalized = natural().normalize(keys.clone());
            for pair in normalized.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
            for key in keys.iter().flatten() {
                prop_assert!(normalized.contains(key));
            }
        }

        #[test]
        fn input_order_does_not_matter(mut keys in prop::collection::vec(0u32..50, 0..40)) {
            let forward = natural().normalize(keys.clone());
            keys.reverse();
            prop_assert_eq!(forward, natural().normalize(keys));
        }
    }
}
