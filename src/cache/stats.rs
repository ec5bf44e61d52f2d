//! Cache Statistics Module
//!
//! Snapshot of the cache's accounting totals and eviction counters.

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries in the registry, charged or not
    pub entries: usize,
    /// Entries in the eviction list
    pub charged_entries: usize,
    /// Bytes charged against the budget
    pub total_charge: u64,
    /// Sum of hit counts over charged entries
    pub total_hits: f64,
    /// Configured byte budget
    pub budget: u64,
    /// Entries discarded to make room for others
    pub evictions: u64,
    /// Admissions refused by the frequency-weighted test
    pub rejected_admissions: u64,
    /// Decay passes run so far
    pub decay_runs: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Utilization ==
    /// Fraction of the budget currently charged.
    ///
    /// Returns 0.0 for a zero budget.
    pub fn utilization(&self) -> f64 {
        if self.budget == 0 {
            0.0
        } else {
            self.total_charge as f64 / self.budget as f64
        }
    }

    // == Record Eviction ==
    /// Adds `count` to the eviction counter.
    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    // == Record Rejection ==
    /// Increments the rejected admission counter.
    pub fn record_rejection(&mut self) {
        self.rejected_admissions += 1;
    }

    // == Record Decay ==
    /// Increments the decay counter.
    pub fn record_decay(&mut self) {
        self.decay_runs += 1;
    }
}
