//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the accounting, ordering, admission and decay
//! guarantees of the cache store.

use proptest::prelude::*;
use std::time::{Duration, Instant, SystemTime};

use crate::cache::entry::mod_stamp;
use crate::cache::{CacheStore, FileMeta, BASE_OVERHEAD, DECAY_THRESHOLD};
use crate::error::CacheError;

// == Test Configuration ==
const TEST_BUDGET: u64 = 16 * 1024;

fn meta(size: u64) -> FileMeta {
    let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    FileMeta {
        size,
        modified: Some(modified),
        mod_stamp: mod_stamp(modified),
        is_directory: false,
    }
}

// == Strategies ==
/// Generates one of a small set of paths so that entries collide often
fn path_strategy() -> impl Strategy<Value = String> {
    (0..24usize).prop_map(|i| format!("dir/file{}.txt", i))
}

/// Generates content sizes from empty up to beyond the budget
fn size_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        4 => 0..2048u64,
        1 => 2048..TEST_BUDGET * 2,
    ]
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Access { path: String, size: u64 },
    Missing { path: String },
    Decay,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        8 => (path_strategy(), size_strategy())
            .prop_map(|(path, size)| CacheOp::Access { path, size }),
        1 => path_strategy().prop_map(|path| CacheOp::Missing { path }),
        1 => Just(CacheOp::Decay),
    ]
}

fn apply(store: &mut CacheStore, op: &CacheOp) {
    match op {
        CacheOp::Access { path, size } => {
            let id = store.get_or_insert(path, |_| None);
            store.apply_metadata(id, &Ok(meta(*size)), Instant::now());
            store.hit(id);
        }
        CacheOp::Missing { path } => {
            let id = store.get_or_insert(path, |_| None);
            let result = Err(CacheError::NotFound(path.clone()));
            store.apply_metadata(id, &result, Instant::now());
            store.hit(id);
        }
        CacheOp::Decay => {
            store.decay();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Total charge always equals the sum of member charges, the list stays
    // sorted by hit count, and no member charge is below the base overhead.
    #[test]
    fn prop_accounting_and_order(ops in prop::collection::vec(cache_op_strategy(), 1..200)) {
        let mut store = CacheStore::new(TEST_BUDGET);

        for op in &ops {
            apply(&mut store, op);
            store.assert_consistent();
        }
    }

    // A cachable verdict always leaves the budget respected.
    #[test]
    fn prop_cachable_fits_budget(ops in prop::collection::vec(cache_op_strategy(), 1..100)) {
        let mut store = CacheStore::new(TEST_BUDGET);

        for op in &ops {
            apply(&mut store, op);
            if let CacheOp::Access { path, .. } = op {
                let id = store.lookup(path).unwrap();
                if store.entry(id).cachable {
                    prop_assert!(store.total_charge() <= TEST_BUDGET);
                }
            }
        }
    }

    // An entry competing against charged entries that are together hit more
    // often is refused, and none of them is evicted.
    #[test]
    fn prop_admission_fairness(
        residents in prop::collection::vec((1..8usize, 64..512u64), 2..8),
        candidate_hits in 1..4usize,
    ) {
        let resident_total: u64 = residents.iter().map(|(_, size)| size + BASE_OVERHEAD).sum();
        let resident_hits: usize = residents.iter().map(|(hits, _)| hits).sum();
        prop_assume!(resident_hits > candidate_hits);

        // Room for the residents and the candidate's overhead, nothing more
        let budget = resident_total + BASE_OVERHEAD;
        let mut store = CacheStore::new(budget);

        for (i, (hits, size)) in residents.iter().enumerate() {
            for _ in 0..*hits {
                apply(&mut store, &CacheOp::Access { path: format!("r{}", i), size: *size });
            }
        }
        prop_assert_eq!(store.total_charge(), resident_total);

        // Warm the candidate up with content-free hits, then ask for room
        // needing every resident's bytes
        for _ in 0..candidate_hits - 1 {
            apply(&mut store, &CacheOp::Access { path: "candidate".to_string(), size: 0 });
        }
        let id = store.get_or_insert("candidate", |_| None);
        store.apply_metadata(id, &Ok(meta(resident_total - 64)), Instant::now());
        let cachable = store.hit(id);

        prop_assert!(!cachable);
        for i in 0..residents.len() {
            let path = format!("r{}", i);
            prop_assert!(store.lookup(&path).is_some(), "{} was evicted", path);
        }
        prop_assert_eq!(store.entry(id).charge, Some(BASE_OVERHEAD));
        store.assert_consistent();
    }

    // After N decays with no hits, every surviving count is its original
    // value times 0.5^N, and nothing at or above the threshold is removed.
    #[test]
    fn prop_decay_monotonicity(
        hits in prop::collection::vec(1..64usize, 1..12),
        rounds in 1..6i32,
    ) {
        let mut store = CacheStore::new(TEST_BUDGET * 64);
        for (i, count) in hits.iter().enumerate() {
            for _ in 0..*count {
                apply(&mut store, &CacheOp::Access { path: format!("f{}", i), size: 16 });
            }
        }

        for _ in 0..rounds {
            store.decay();
        }

        let factor = 0.5f64.powi(rounds);
        for (i, count) in hits.iter().enumerate() {
            let expected = *count as f64 * factor;
            match store.lookup(&format!("f{}", i)) {
                Some(id) => prop_assert_eq!(store.entry(id).hit_count, expected),
                None => {
                    // Removed in some round: its count at that round was below the threshold
                    let at_removal = (0..rounds)
                        .map(|r| *count as f64 * 0.5f64.powi(r + 1))
                        .find(|v| *v < DECAY_THRESHOLD);
                    prop_assert!(at_removal.is_some(), "f{} removed while relevant", i);
                }
            }
        }
        store.assert_consistent();
    }

    // Every path resolves to exactly one entry however often it is accessed.
    #[test]
    fn prop_registry_unique(paths in prop::collection::vec(path_strategy(), 1..100)) {
        let mut store = CacheStore::new(TEST_BUDGET * 64);

        for path in &paths {
            let first = store.get_or_insert(path, |_| None);
            let second = store.get_or_insert(path, |_| None);
            prop_assert_eq!(first, second);
        }

        let distinct: std::collections::HashSet<&String> = paths.iter().collect();
        prop_assert_eq!(store.len(), distinct.len());
    }
}
