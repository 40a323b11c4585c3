//! Stress command.
//!
//! Runs one of the testkit stress drivers against a fresh locker and reports
//! throughput, exclusion violations and lock statistics.

use super::{print_stats, stats_json};
use entilock_core::{EntityLocker, LockProperties};
use entilock_testkit::stress::{self, StressConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Workload run by the stress command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// All threads contend for one key
    Single,
    /// Threads re-enter keys before releasing them
    Reentrant,
    /// Threads lock random overlapping batches
    Batches,
    /// Threads try random batches with a timeout
    TryBatches,
}

/// Run a stress workload.
pub fn run(
    mode: Mode,
    config: &StressConfig,
    depth: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let timeout = Duration::from_millis(config.timeout_millis.max(1) as u64);
    let locker = Arc::new(EntityLocker::new(LockProperties::natural(timeout)?));

    info!(
        ?mode,
        threads = config.threads,
        operations = config.operations,
        keys = config.key_count,
        "Starting stress run"
    );

    let result = match mode {
        Mode::Single => stress::stress_single_key(Arc::clone(&locker), config),
        Mode::Reentrant => stress::stress_reentrant(Arc::clone(&locker), config, depth.max(1)),
        Mode::Batches => stress::stress_batches(Arc::clone(&locker), config),
        Mode::TryBatches => stress::stress_try_batches(Arc::clone(&locker), config),
    };
    let stats = locker.stats();

    if result.violations > 0 {
        warn!(violations = result.violations, "Mutual exclusion violated");
    }
    if locker.locked_count() > 0 {
        warn!(leaked = locker.locked_count(), "Keys still held after run");
    }

    match format {
        "json" => {
            let output = serde_json::json!({
                "mode": format!("{:?}", mode).to_lowercase(),
                "result": result,
                "stats": stats_json(&stats),
                "leaked_keys": locker.locked_count(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            result.print_summary(&format!("{:?}", mode));
            print_stats(&stats);
        }
    }

    if result.violations > 0 {
        return Err(format!("{} exclusion violations", result.violations).into());
    }

    Ok(())
}
