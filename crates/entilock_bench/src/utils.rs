//! Benchmark utilities.

use entilock_core::{EntityLocker, LockProperties};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

/// Create a locker over `u64` keys with natural order.
pub fn bench_locker() -> EntityLocker<u64> {
    let props = LockProperties::natural(Duration::from_secs(1)).expect("Invalid lock properties");
    EntityLocker::new(props)
}

/// Generate `count` random keys below `key_space`.
pub fn random_keys(count: usize, key_space: u64) -> Vec<u64> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(0..key_space.max(1))).collect()
}

/// Generate `count` batches of `size` distinct keys each, in shuffled order.
pub fn generate_batches(count: usize, size: usize, key_space: u64) -> Vec<Vec<u64>> {
    let mut rng = rand::thread_rng();
    let keys: Vec<u64> = (0..key_space.max(1)).collect();
    (0..count)
        .map(|_| {
            let mut batch: Vec<u64> = keys.choose_multiple(&mut rng, size).copied().collect();
            batch.shuffle(&mut rng);
            batch
        })
        .collect()
}
