//! Cache Module
//!
//! Bounded in-memory cache of file metadata and content with
//! frequency-weighted admission, eviction and periodic decay.

mod entry;
mod file;
mod list;
pub mod path;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

use std::time::Duration;

// Re-export public types
pub use entry::{CacheEntry, EntryId, FileMeta};
pub use file::{http_date, CachedFile, FileCache, FileInfo};
pub use stats::CacheStats;
pub use store::{CacheStore, DecayReport};

// == Public Constants ==
/// Minimum charge of every tracked entry, in bytes
pub const BASE_OVERHEAD: u64 = 256;

/// Default global byte budget
pub const DEFAULT_BUDGET: u64 = 10 * 1024 * 1024;

/// Entries dropped from the cold end when a new entry overflows the budget
pub const EMERGENCY_EVICTIONS: usize = 5;

/// Idle time before hit counts decay
pub const DECAY_INTERVAL: Duration = Duration::from_secs(10);

/// Total hit count that forces an immediate decay
pub const HIT_HIGH_WATER: f64 = 10_000.0;

/// Entries decayed below this hit count are discarded
pub const DECAY_THRESHOLD: f64 = 0.4;

/// Window during which a completed stat is reused
pub const METADATA_FRESHNESS: Duration = Duration::from_millis(100);
