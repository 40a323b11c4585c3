//! # EntiLock Core
//!
//! In-process mutual exclusion scoped to entity keys.
//!
//! This crate provides:
//! - Reentrant per-key locks with blocking, timed and cancellable acquisition
//! - Deadlock-free multi-key locking through one global key order
//! - All-or-nothing batches that roll back on timeout or cancellation
//! - Sessions for explicit execution contexts, and RAII guards
//! - Lock statistics
//!
//! ## Key Invariants
//!
//! - At most one context owns a key at any time
//! - Only the owner can release a key; releasing an unheld key is a no-op
//! - A key is free only after as many releases as acquisitions
//! - Multi-key batches acquire keys in the configured order under one deadline
//! - Timeout is reported as `Ok(false)`, never as an error
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entilock_core::{EntityLocker, LockProperties};
//! use std::time::Duration;
//!
//! let locker = EntityLocker::new(LockProperties::natural(Duration::from_secs(1))?);
//! locker.lock_all([2u64, 1, 2])?; // takes 1, then 2
//! locker.unlock_all([1u64, 2])?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod config;
mod deadline;
mod error;
mod guard;
mod locker;
mod normalize;
mod session;
mod stats;
mod table;
mod types;

pub use cancel::CancelToken;
pub use config::{KeyOrder, LockProperties, LockPropertiesBuilder};
pub use deadline::Deadline;
pub use error::{LockError, LockResult};
pub use guard::EntityGuard;
pub use locker::EntityLocker;
pub use normalize::KeyNormalizer;
pub use session::LockSession;
pub use stats::{LockStats, StatsSnapshot};
pub use table::{AcquireOutcome, LockTable};
pub use types::ContextId;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
