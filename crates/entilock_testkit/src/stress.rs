//! Stress drivers for EntiLock.
//!
//! Each driver hammers a shared locker from several threads and checks
//! mutual exclusion on the fly: every key has an occupancy counter that must
//! read zero when a thread enters the critical section.

use entilock_core::EntityLocker;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone, Serialize)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Operations that acquired their keys.
    pub successful_ops: usize,
    /// Operations that timed out.
    pub failed_ops: usize,
    /// Times two threads were seen inside one key's critical section.
    pub violations: usize,
    /// Total duration.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_micros() as f64 / 1_000.0)
    }
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, violations: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            violations,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Timed out: {}", self.failed_ops);
        println!("Exclusion violations: {}", self.violations);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct keys.
    pub key_count: usize,
    /// Keys per multi-key operation.
    pub batch_size: usize,
    /// Timeout for `try_lock*` drivers.
    pub timeout_millis: i64,
    /// Seed for per-thread key shuffling.
    pub seed: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 8,
            key_count: 16,
            batch_size: 4,
            timeout_millis: 5,
            seed: 0x5eed,
        }
    }
}

/// Per-key occupancy counters.
struct Occupancy {
    inside: Vec<AtomicUsize>,
    violations: AtomicUsize,
}

impl Occupancy {
    fn new(key_count: usize) -> Self {
        Self {
            inside: (0..key_count).map(|_| AtomicUsize::new(0)).collect(),
            violations: AtomicUsize::new(0),
        }
    }

    fn enter(&self, keys: &[u64]) {
        for &key in keys {
            if self.inside[key as usize].fetch_add(1, Ordering::AcqRel) != 0 {
                self.violations.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn leave(&self, keys: &[u64]) {
        for &key in keys {
            self.inside[key as usize].fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn violations(&self) -> usize {
        self.violations.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Tally {
    successful: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    fn finish(&self, occupancy: &Occupancy, start: Instant) -> StressTestResult {
        StressTestResult::new(
            self.successful.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            occupancy.violations(),
            start.elapsed(),
        )
    }
}

/// Runs `body(thread_index, occupancy, tally)` on `config.threads` threads.
fn run_threads<F>(config: &StressConfig, body: F) -> StressTestResult
where
    F: Fn(usize, &Occupancy, &Tally) + Send + Sync + 'static,
{
    let occupancy = Arc::new(Occupancy::new(config.key_count.max(1)));
    let tally = Arc::new(Tally::default());
    let body = Arc::new(body);
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let occupancy = Arc::clone(&occupancy);
            let tally = Arc::clone(&tally);
            let body = Arc::clone(&body);
            thread::spawn(move || body(t, &occupancy, &tally))
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    tally.finish(&occupancy, start)
}

/// Every thread locks and unlocks one shared key.
pub fn stress_single_key(locker: Arc<EntityLocker<u64>>, config: &StressConfig) -> StressTestResult {
    let operations = config.operations;
    run_threads(config, move |_, occupancy, tally| {
        for _ in 0..operations {
            locker.lock(0).expect("lock failed");
            occupancy.enter(&[0]);
            occupancy.leave(&[0]);
            locker.unlock(0).expect("unlock failed");
            tally.successful.fetch_add(1, Ordering::Relaxed);
        }
    })
}

/// Every thread re-enters a key `depth` times before releasing it.
pub fn stress_reentrant(
    locker: Arc<EntityLocker<u64>>,
    config: &StressConfig,
    depth: usize,
) -> StressTestResult {
    let operations = config.operations;
    let key_count = config.key_count.max(1) as u64;
    run_threads(config, move |t, occupancy, tally| {
        for i in 0..operations {
            let key = (t + i) as u64 % key_count;
            for _ in 0..depth {
                locker.lock(key).expect("lock failed");
            }
            occupancy.enter(&[key]);
            occupancy.leave(&[key]);
            for _ in 0..depth {
                locker.unlock(key).expect("unlock failed");
            }
            tally.successful.fetch_add(1, Ordering::Relaxed);
        }
    })
}

/// Every thread locks random overlapping batches, passed in shuffled order.
pub fn stress_batches(locker: Arc<EntityLocker<u64>>, config: &StressConfig) -> StressTestResult {
    let operations = config.operations;
    let key_count = config.key_count.max(1);
    let batch_size = config.batch_size.clamp(1, key_count);
    let seed = config.seed;
    run_threads(config, move |t, occupancy, tally| {
        let mut rng = StdRng::seed_from_u64(seed ^ t as u64);
        let keys: Vec<u64> = (0..key_count as u64).collect();
        for _ in 0..operations {
            let mut batch: Vec<u64> = keys.choose_multiple(&mut rng, batch_size).copied().collect();
            batch.shuffle(&mut rng);

            locker.lock_all(batch.clone()).expect("lock_all failed");
            occupancy.enter(&batch);
            occupancy.leave(&batch);
            locker.unlock_all(batch).expect("unlock_all failed");
            tally.successful.fetch_add(1, Ordering::Relaxed);
        }
    })
}

/// Like [`stress_batches`] with `try_lock_all_for`; a timed-out batch must
/// leave none of its keys held.
pub fn stress_try_batches(locker: Arc<EntityLocker<u64>>, config: &StressConfig) -> StressTestResult {
    let operations = config.operations;
    let key_count = config.key_count.max(1);
    let batch_size = config.batch_size.clamp(1, key_count);
    let timeout_millis = config.timeout_millis;
    let seed = config.seed;
    run_threads(config, move |t, occupancy, tally| {
        let mut rng = StdRng::seed_from_u64(seed ^ t as u64);
        let keys: Vec<u64> = (0..key_count as u64).collect();
        for _ in 0..operations {
            let batch: Vec<u64> = keys.choose_multiple(&mut rng, batch_size).copied().collect();

            if locker
                .try_lock_all_for(batch.clone(), timeout_millis)
                .expect("try_lock_all_for failed")
            {
                occupancy.enter(&batch);
                occupancy.leave(&batch);
                locker.unlock_all(batch).expect("unlock_all failed");
                tally.successful.fetch_add(1, Ordering::Relaxed);
            } else {
                if batch.iter().any(|key| locker.is_held_by_current_thread(key)) {
                    occupancy.violations.fetch_add(1, Ordering::Relaxed);
                }
                tally.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    })
}
