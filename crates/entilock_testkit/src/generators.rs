//! Property-based test generators using proptest.
//!
//! Provides strategies for key batches and lock operation sequences, plus a
//! hold-count model to check a locker against.

use entilock_core::{EntityLocker, LockResult};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Strategy for keys drawn from `0..key_space`.
pub fn key_strategy(key_space: u64) -> impl Strategy<Value = u64> {
    0..key_space.max(1)
}

/// Strategy for key batches that may contain duplicates.
pub fn key_batch_strategy(key_space: u64, max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(key_strategy(key_space), 0..=max_len)
}

/// Strategy for key batches with absent entries mixed in.
pub fn sparse_key_batch_strategy(
    key_space: u64,
    max_len: usize,
) -> impl Strategy<Value = Vec<Option<u64>>> {
    prop::collection::vec(
        prop_oneof![
            4 => key_strategy(key_space).prop_map(Some),
            1 => Just(None),
        ],
        0..=max_len,
    )
}

/// A single-threaded lock operation.
#[derive(Debug, Clone)]
pub enum LockOp {
    /// Acquire one key
    Lock(u64),
    /// Acquire one key with a timeout
    TryLock(u64),
    /// Release one key
    Unlock(u64),
    /// Acquire a batch
    LockAll(Vec<Option<u64>>),
    /// Release a batch
    UnlockAll(Vec<Option<u64>>),
}

/// Strategy for lock operations.
pub fn lock_op_strategy(key_space: u64) -> impl Strategy<Value = LockOp> {
    prop_oneof![
        3 => key_strategy(key_space).prop_map(LockOp::Lock),
        1 => key_strategy(key_space).prop_map(LockOp::TryLock),
        3 => key_strategy(key_space).prop_map(LockOp::Unlock),
        2 => sparse_key_batch_strategy(key_space, 6).prop_map(LockOp::LockAll),
        2 => sparse_key_batch_strategy(key_space, 6).prop_map(LockOp::UnlockAll),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn lock_op_sequence_strategy(
    key_space: u64,
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<LockOp>> {
    prop::collection::vec(lock_op_strategy(key_space), min_ops..max_ops)
}

/// Expected hold counts of one context.
#[derive(Debug, Clone, Default)]
pub struct HoldModel {
    holds: BTreeMap<u64, u32>,
}

impl HoldModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `op` to the model.
    pub fn apply(&mut self, op: &LockOp) {
        match op {
            LockOp::Lock(key) | LockOp::TryLock(key) => self.acquire(*key),
            LockOp::Unlock(key) => self.release(*key),
            LockOp::LockAll(keys) => distinct(keys).into_iter().for_each(|key| self.acquire(key)),
            LockOp::UnlockAll(keys) => distinct(keys).into_iter().for_each(|key| self.release(key)),
        }
    }

    /// Expected hold count of `key`.
    pub fn holds(&self, key: u64) -> u32 {
        self.holds.get(&key).copied().unwrap_or(0)
    }

    /// Number of keys with at least one hold.
    pub fn held_count(&self) -> usize {
        self.holds.len()
    }

    fn acquire(&mut self, key: u64) {
        *self.holds.entry(key).or_insert(0) += 1;
    }

    fn release(&mut self, key: u64) {
        if let Some(count) = self.holds.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.holds.remove(&key);
            }
        }
    }
}

fn distinct(keys: &[Option<u64>]) -> BTreeSet<u64> {
    keys.iter().flatten().copied().collect()
}

/// Applies `op` to `locker` on the calling thread.
///
/// Returns whether the acquisition succeeded; releases report `true`.
pub fn apply_op(locker: &EntityLocker<u64>, op: &LockOp) -> LockResult<bool> {
    match op {
        LockOp::Lock(key) => locker.lock(*key).map(|()| true),
        LockOp::TryLock(key) => locker.try_lock_for(*key, 10),
        LockOp::Unlock(key) => locker.unlock(*key).map(|()| true),
        LockOp::LockAll(keys) => locker.lock_all(keys.iter().copied()).map(|()| true),
        LockOp::UnlockAll(keys) => locker.unlock_all(keys.iter().copied()).map(|()| true),
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
