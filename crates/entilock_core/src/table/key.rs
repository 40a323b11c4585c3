//! Table keys ordered by the configured comparator.
//!
//! Stored keys carry the [`KeyOrder`] so they can live in a `BTreeMap`.
//! Lookups borrow stored keys as `dyn KeyView`, which lets a plain `&K`
//! search the map without being cloned into a [`TableKey`].

use crate::config::KeyOrder;
use std::borrow::Borrow;
use std::cmp::Ordering;

/// A key as seen by the table's ordering.
pub(crate) trait KeyView<K> {
    fn key(&self) -> &K;
    fn order(&self) -> &KeyOrder<K>;
}

/// Owned key stored in the table.
pub(crate) struct TableKey<K> {
    key: K,
    order: KeyOrder<K>,
}

impl<K> TableKey<K> {
    pub(crate) fn new(key: K, order: KeyOrder<K>) -> Self {
        Self { key, order }
    }
}

/// Borrowed lookup key.
pub(crate) struct Probe<'k, K> {
    key: &'k K,
    order: &'k KeyOrder<K>,
}

impl<'k, K> Probe<'k, K> {
    pub(crate) fn new(key: &'k K, order: &'k KeyOrder<K>) -> Self {
        Self { key, order }
    }
}

impl<K> KeyView<K> for TableKey<K> {
    fn key(&self) -> &K {
        &self.key
    }

    fn order(&self) -> &KeyOrder<K> {
        &self.order
    }
}

impl<K> KeyView<K> for Probe<'_, K> {
    fn key(&self) -> &K {
        self.key
    }

    fn order(&self) -> &KeyOrder<K> {
        self.order
    }
}

impl<'a, K> PartialEq for dyn KeyView<K> + 'a {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<'a, K> Eq for dyn KeyView<K> + 'a {}

impl<'a, K> PartialOrd for dyn KeyView<K> + 'a {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a, K> Ord for dyn KeyView<K> + 'a {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.order())(self.key(), other.key())
    }
}

impl<K> PartialEq for TableKey<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K> Eq for TableKey<K> {}

impl<K> PartialOrd for TableKey<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for TableKey<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.order)(&self.key, &other.key)
    }
}

impl<'a, K: 'a> Borrow<dyn KeyView<K> + 'a> for TableKey<K> {
    fn borrow(&self) -> &(dyn KeyView<K> + 'a) {
        self
    }
}
