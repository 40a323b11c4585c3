//! # EntiLock Testkit
//!
//! Test utilities for EntiLock.
//!
//! This crate provides:
//! - Locker fixtures and a background key holder
//! - Property-based test generators and a hold-count model
//! - Multi-threaded stress drivers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entilock_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_locker() {
//!     with_locker(|locker| {
//!         let held = HeldKeys::spawn(locker, vec![1]);
//!         assert!(!locker.try_lock_for(1, 10).unwrap());
//!         held.release();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
