//! Versioned cache store for offline support.
//!
//! This module provides:
//! - Generations named `prefix + version`, one of which is current
//! - URL keyed response entries inside each generation
//! - Purging of stale generations sharing the app prefix
//! - A SQLite backend that survives restarts

mod generation;
mod layer;
mod source;
mod storage;

pub use generation::Generation;
pub use layer::{CacheHandle, CacheStore};
pub use source::{ResponseSource, Served};
pub use storage::{CacheStorage, SqliteStorage};
