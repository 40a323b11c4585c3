//! Contention command.
//!
//! One session holds a set of keys for a fixed time while worker threads try
//! to take the same keys within a timeout. An optional cancellation token is
//! fired partway through to interrupt the workers still waiting.

use super::{print_stats, stats_json};
use entilock_core::{CancelToken, EntityLocker, LockError, LockProperties};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Contention scenario parameters.
#[derive(Debug, Clone)]
pub struct ContendArgs {
    /// Keys held by the holder and requested by every worker.
    pub keys: Vec<u64>,
    /// Worker threads.
    pub threads: usize,
    /// How long the holder keeps the keys.
    pub hold_millis: u64,
    /// Per-worker batch timeout.
    pub timeout_millis: i64,
    /// Cancel waiting workers after this long.
    pub cancel_after_millis: Option<u64>,
}

#[derive(Debug, Default)]
struct Outcomes {
    acquired: usize,
    timed_out: usize,
    cancelled: usize,
}

/// The holder's keys rotated per worker, so workers request them in
/// different orders.
fn worker_keys(keys: &[u64], worker: usize) -> Vec<u64> {
    let mut rotated = keys.to_vec();
    let len = rotated.len().max(1);
    rotated.rotate_left(worker % len);
    rotated
}

/// Run the contention scenario.
pub fn run(args: &ContendArgs, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let properties = LockProperties::natural(Duration::from_millis(args.hold_millis.max(1)))?;
    let locker = Arc::new(EntityLocker::new(properties));
    let token = CancelToken::new();

    info!(
        keys = ?args.keys,
        threads = args.threads,
        hold_millis = args.hold_millis,
        "Starting contention run"
    );

    let start = Instant::now();
    let holder = locker.guard_all(args.keys.iter().copied())?;

    let workers: Vec<_> = (0..args.threads)
        .map(|worker| {
            let locker = Arc::clone(&locker);
            let token = token.clone();
            let keys = worker_keys(&args.keys, worker);
            let timeout_millis = args.timeout_millis;
            thread::spawn(move || -> Result<bool, LockError> {
                let session = locker.session().with_cancel(token);
                let acquired = session.try_lock_all_for(keys.iter().copied(), timeout_millis)?;
                if acquired {
                    debug!(worker, "Worker acquired keys");
                    session.unlock_all(keys)?;
                }
                Ok(acquired)
            })
        })
        .collect();

    let canceller = args.cancel_after_millis.map(|after| {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(after));
            token.cancel_with("contend: cancel deadline reached");
        })
    });

    thread::sleep(Duration::from_millis(args.hold_millis));
    holder.unlock()?;

    let mut outcomes = Outcomes::default();
    for worker in workers {
        match worker.join().map_err(|_| "Worker thread panicked")? {
            Ok(true) => outcomes.acquired += 1,
            Ok(false) => outcomes.timed_out += 1,
            Err(err) if err.is_cancelled() => outcomes.cancelled += 1,
            Err(err) => return Err(err.into()),
        }
    }
    if let Some(canceller) = canceller {
        canceller.join().map_err(|_| "Canceller thread panicked")?;
    }
    let elapsed = start.elapsed();
    let stats = locker.stats();

    match format {
        "json" => {
            let output = serde_json::json!({
                "acquired": outcomes.acquired,
                "timed_out": outcomes.timed_out,
                "cancelled": outcomes.cancelled,
                "elapsed_ms": elapsed.as_millis() as u64,
                "stats": stats_json(&stats),
                "leaked_keys": locker.locked_count(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("\n=== Contention ===");
            println!("Workers: {}", args.threads);
            println!("Acquired: {}", outcomes.acquired);
            println!("Timed out: {}", outcomes.timed_out);
            println!("Cancelled: {}", outcomes.cancelled);
            println!("Elapsed: {:?}", elapsed);
            print_stats(&stats);
        }
    }

    Ok(())
}
