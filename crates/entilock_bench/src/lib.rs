//! Benchmarks for EntiLock.

pub mod utils;
