//! CLI command implementations.

pub mod contend;
pub mod stress;

use entilock_core::StatsSnapshot;

/// Renders lock statistics as JSON.
pub(crate) fn stats_json(stats: &StatsSnapshot) -> serde_json::Value {
    serde_json::json!({
        "acquisitions": stats.acquisitions,
        "reentrant_acquisitions": stats.reentrant_acquisitions,
        "contended": stats.contended,
        "timeouts": stats.timeouts,
        "cancellations": stats.cancellations,
        "releases": stats.releases,
        "rollbacks": stats.rollbacks,
        "ownership_violations": stats.ownership_violations,
    })
}

/// Prints lock statistics as text.
pub(crate) fn print_stats(stats: &StatsSnapshot) {
    println!("Lock statistics:");
    println!("  Acquisitions: {}", stats.acquisitions);
    println!("  Reentrant: {}", stats.reentrant_acquisitions);
    println!("  Contended: {} ({:.1}%)", stats.contended, stats.contention_ratio() * 100.0);
    println!("  Timeouts: {}", stats.timeouts);
    println!("  Cancellations: {}", stats.cancellations);
    println!("  Releases: {}", stats.releases);
    println!("  Rollbacks: {}", stats.rollbacks);
    println!("  Ownership violations: {}", stats.ownership_violations);
}
