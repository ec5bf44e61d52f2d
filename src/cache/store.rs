//! Cache Store Module
//!
//! Path registry plus the frequency-weighted admission and eviction engine.
//!
//! Every charged entry sits in a [`FrequencyList`] sorted by hit count. Each
//! access bumps the count, re-sorts the entry, and asks for room for the
//! entry's content. Room is taken from the cold end of the list only when the
//! entry is hit more often than everything it would displace combined.

use std::collections::HashMap;
use std::time::Instant;

use axum::body::Bytes;
use tracing::{debug, warn};

use crate::cache::entry::{CacheEntry, EntryArena, EntryId, FileMeta, PendingMeta};
use crate::cache::list::FrequencyList;
use crate::cache::{
    CacheStats, BASE_OVERHEAD, DECAY_THRESHOLD, EMERGENCY_EVICTIONS, HIT_HIGH_WATER,
    METADATA_FRESHNESS,
};
use crate::error::Result;

// == Decay Report ==
/// Outcome of one decay pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayReport {
    /// Entries discarded because their hit count fell below the threshold
    pub removed: usize,
    /// True when nothing is left to decay
    pub idle: bool,
}

// == Cache Store ==
/// Registry of every tracked path and the accounting behind it.
#[derive(Debug)]
pub struct CacheStore {
    /// Normalized path to entry
    index: HashMap<String, EntryId>,
    /// Owner of every entry
    arena: EntryArena,
    /// Charged entries in ascending hit order
    list: FrequencyList,
    /// Sum of charges over list members
    total_charge: u64,
    /// Sum of hit counts over list members
    total_hits: f64,
    /// Global byte budget
    budget: u64,
    /// Eviction counters
    stats: CacheStats,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store that charges at most `budget` bytes.
    pub fn new(budget: u64) -> Self {
        Self {
            index: HashMap::new(),
            arena: EntryArena::new(),
            list: FrequencyList::new(),
            total_charge: 0,
            total_hits: 0.0,
            budget,
            stats: CacheStats::new(),
        }
    }

    // == Registry ==
    /// Returns the id for `path` if it is tracked.
    pub fn lookup(&self, path: &str) -> Option<EntryId> {
        self.index.get(path).copied()
    }

    /// Returns the entry for `path`, creating an uncharged one on first use.
    ///
    /// `mime` is only called when a new entry is created.
    pub fn get_or_insert<F>(&mut self, path: &str, mime: F) -> EntryId
    where
        F: FnOnce(&str) -> Option<String>,
    {
        if let Some(id) = self.lookup(path) {
            return id;
        }
        let entry = CacheEntry::new(path.to_string(), mime(path));
        let id = self.arena.insert(entry);
        self.index.insert(path.to_string(), id);
        id
    }

    pub fn entry(&self, id: EntryId) -> &CacheEntry {
        &self.arena[id]
    }

    // == Metadata ==
    /// Returns the fetch a caller should attach to instead of issuing a new stat.
    ///
    /// A fetch is reused while it is still in flight, or for a short window
    /// after its result was applied.
    pub fn pending_fetch(&self, id: EntryId, now: Instant) -> Option<PendingMeta> {
        let entry = &self.arena[id];
        let pending = entry.pending.as_ref()?;
        let in_flight = pending.peek().is_none();
        let fresh = entry.fresh_until.map_or(false, |until| now < until);
        (in_flight || fresh).then(|| pending.clone())
    }

    /// Records a newly issued metadata fetch.
    pub fn start_fetch(&mut self, id: EntryId, fetch: PendingMeta) {
        let entry = &mut self.arena[id];
        entry.pending = Some(fetch);
        entry.fresh_until = None;
    }

    /// Stores the outcome of `fetch` unless a newer fetch has replaced it.
    ///
    /// Returns false when the result is stale; the entry is left untouched
    /// and the caller keeps its own result. An entry recreated after
    /// eviction has no fetch on record and adopts this one.
    pub fn apply_fetch(
        &mut self,
        id: EntryId,
        fetch: &PendingMeta,
        result: &Result<FileMeta>,
        now: Instant,
    ) -> bool {
        let entry = &mut self.arena[id];
        let superseded = entry
            .pending
            .as_ref()
            .map_or(false, |current| !current.ptr_eq(fetch));
        if superseded {
            debug!("Ignoring superseded stat of {}", entry.path);
            return false;
        }
        if entry.pending.is_none() {
            entry.pending = Some(fetch.clone());
        }
        self.apply_metadata(id, result, now);
        true
    }

    /// Stores the outcome of a metadata fetch.
    ///
    /// Failures reset the metadata and drop cached content. The freshness
    /// window starts when the first waiter applies the result.
    pub fn apply_metadata(&mut self, id: EntryId, result: &Result<FileMeta>, now: Instant) {
        let entry = &mut self.arena[id];
        match result {
            Ok(meta) => entry.meta = meta.clone(),
            Err(_) => {
                entry.meta = FileMeta::default();
                entry.content = None;
                entry.content_stamp = 0;
            }
        }
        if entry.fresh_until.is_none() {
            entry.fresh_until = Some(now + METADATA_FRESHNESS);
        }
    }

    // == Hit ==
    /// Records one access to `id` and returns whether its content may be cached.
    pub fn hit(&mut self, id: EntryId) -> bool {
        self.arena[id].hit_count += 1.0;
        self.total_hits += 1.0;

        if self.arena[id].is_charged() {
            self.list.resort(&mut self.arena, id);
        } else {
            self.arena[id].charge = Some(BASE_OVERHEAD);
            self.total_charge += BASE_OVERHEAD;
            if self.total_charge > self.budget {
                let evicted = self.evict_head(EMERGENCY_EVICTIONS);
                warn!(
                    "Cache over budget ({} > {}), evicted {} entries",
                    self.total_charge, self.budget, evicted
                );
            }
            self.list.insert_sorted(&mut self.arena, id);
        }

        let wanted = self.arena[id].meta.size.saturating_add(BASE_OVERHEAD);
        let cachable = if wanted > self.budget {
            self.release_content(id);
            false
        } else if self.arena[id].charge == Some(wanted) {
            self.arena[id].cachable
        } else {
            self.reclaim_space(id, wanted)
        };
        self.arena[id].cachable = cachable;

        if self.total_hits > HIT_HIGH_WATER {
            self.decay();
        }
        cachable
    }

    // == Reclaim Space ==
    /// Tries to grow or shrink the charge of `id` to `wanted` bytes.
    ///
    /// When the budget lacks room, candidates are taken from the head of the
    /// list until enough bytes are freed. Each candidate's hit count is
    /// subtracted from the target's; once that reaches zero the candidates are
    /// worth at least as much as the target, so nothing is evicted, the
    /// target's content is dropped and it is charged the base overhead only.
    pub fn reclaim_space(&mut self, id: EntryId, wanted: u64) -> bool {
        let current = self.arena[id].charge.unwrap_or(0);
        let free = i128::from(self.budget) - i128::from(self.total_charge);
        let deficit = i128::from(wanted) - i128::from(current) - free;

        if deficit <= 0 {
            self.set_charge(id, wanted);
            return true;
        }

        let mut freed: i128 = 0;
        let mut affordable = self.arena[id].hit_count;
        let mut victims = Vec::new();
        let mut admitted = false;

        for candidate in self.list.iter(&self.arena) {
            if candidate == id {
                continue;
            }
            let entry = &self.arena[candidate];
            affordable -= entry.hit_count;
            if affordable <= 0.0 {
                break;
            }
            freed += i128::from(entry.charge.unwrap_or(0));
            victims.push(candidate);
            if freed >= deficit {
                admitted = true;
                break;
            }
        }

        if !admitted {
            self.release_content(id);
            self.stats.record_rejection();
            debug!(
                "Rejected caching {} ({} bytes wanted, {} short)",
                self.arena[id].path, wanted, deficit
            );
            return false;
        }

        for victim in &victims {
            self.discard(*victim);
        }
        self.stats.record_evictions(victims.len());
        self.set_charge(id, wanted);
        debug!(
            "Admitted {} ({} bytes) by evicting {} entries",
            self.arena[id].path,
            wanted,
            victims.len()
        );
        true
    }

    // == Evict Head ==
    /// Discards up to `count` entries from the cold end, regardless of value.
    pub fn evict_head(&mut self, count: usize) -> usize {
        let mut evicted = 0;
        while evicted < count {
            let Some(head) = self.list.head() else {
                break;
            };
            self.discard(head);
            evicted += 1;
        }
        self.stats.record_evictions(evicted);
        evicted
    }

    // == Decay ==
    /// Halves every hit count and discards entries that fall below the
    /// relevance threshold.
    ///
    /// Uniform scaling keeps the list sorted, so the discarded entries always
    /// form a prefix of it.
    pub fn decay(&mut self) -> DecayReport {
        for entry in self.arena.iter_mut() {
            entry.hit_count *= 0.5;
        }
        self.total_hits *= 0.5;

        let mut removed = 0;
        while let Some(head) = self.list.head() {
            if self.arena[head].hit_count >= DECAY_THRESHOLD {
                break;
            }
            self.discard(head);
            removed += 1;
        }
        self.stats.record_decay();

        DecayReport {
            removed,
            idle: self.list.is_empty() && self.total_charge == 0,
        }
    }

    // == Content ==
    /// Keeps freshly read file bytes if the entry is cachable.
    ///
    /// Uncachable reads are not retained, so the next request reads again.
    pub fn store_content(&mut self, id: EntryId, data: Bytes, stamp: u64) {
        let cachable = self.arena[id].cachable;
        self.put_content(id, data, stamp, cachable);
    }

    /// Keeps a rendered directory listing unless it is larger than the budget.
    pub fn store_listing(&mut self, id: EntryId, data: Bytes, stamp: u64) {
        let fits = (data.len() as u64) < self.budget;
        self.put_content(id, data, stamp, fits);
    }

    // == Stats ==
    /// Returns a snapshot of the accounting totals.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.index.len(),
            charged_entries: self.list.len(),
            total_charge: self.total_charge,
            total_hits: self.total_hits,
            budget: self.budget,
            ..self.stats.clone()
        }
    }

    pub fn total_charge(&self) -> u64 {
        self.total_charge
    }

    pub fn total_hits(&self) -> f64 {
        self.total_hits
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Returns the number of tracked paths.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns tracked paths in eviction order, coldest first.
    pub fn eviction_order(&self) -> Vec<String> {
        self.list
            .iter(&self.arena)
            .map(|id| self.arena[id].path.clone())
            .collect()
    }

    // == Internal Helpers ==
    fn set_charge(&mut self, id: EntryId, wanted: u64) {
        let current = self.arena[id].charge.unwrap_or(0);
        self.total_charge = self.total_charge + wanted - current;
        self.arena[id].charge = Some(wanted);
    }

    /// Drops cached content and shrinks the charge back to the base overhead.
    fn release_content(&mut self, id: EntryId) {
        if self.arena[id].is_charged() {
            self.set_charge(id, BASE_OVERHEAD);
        }
        let entry = &mut self.arena[id];
        entry.content = None;
        entry.content_stamp = 0;
    }

    fn put_content(&mut self, id: EntryId, data: Bytes, stamp: u64, keep: bool) {
        let entry = &mut self.arena[id];
        if keep && stamp != 0 {
            entry.content = Some(data);
            entry.content_stamp = stamp;
        } else {
            entry.content = None;
            entry.content_stamp = 0;
        }
    }

    /// Removes an entry from the list, the totals, the index and the arena.
    fn discard(&mut self, id: EntryId) {
        let Some(charged) = self.arena.get(id).map(CacheEntry::is_charged) else {
            return;
        };
        if charged {
            self.list.unlink(&mut self.arena, id);
        }
        let Some(entry) = self.arena.remove(id) else {
            return;
        };
        if let Some(charge) = entry.charge {
            self.total_charge -= charge;
            self.total_hits -= entry.hit_count;
        }
        if self.list.is_empty() {
            self.total_hits = 0.0;
        }
        self.index.remove(&entry.path);
    }

    /// Asserts the accounting and ordering invariants.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let members: Vec<EntryId> = self.list.iter(&self.arena).collect();
        assert_eq!(members.len(), self.list.len(), "list length drifted");

        let charge: u64 = members.iter().map(|&id| self.arena[id].charge.unwrap()).sum();
        assert_eq!(charge, self.total_charge, "total charge drifted");

        let hits: f64 = members.iter().map(|&id| self.arena[id].hit_count).sum();
        assert!(
            (hits - self.total_hits).abs() < 1e-6 * hits.max(1.0),
            "total hits drifted: {} vs {}",
            hits,
            self.total_hits
        );

        for pair in members.windows(2) {
            assert!(
                self.arena[pair[0]].hit_count <= self.arena[pair[1]].hit_count,
                "list out of order"
            );
        }

        for &id in &members {
            let charge = self.arena[id].charge.unwrap();
            assert!(charge >= BASE_OVERHEAD);
            assert!(charge <= self.budget || members.len() == 1);
        }

        for (path, &id) in &self.index {
            assert_eq!(&self.arena[id].path, path);
        }
        assert_eq!(self.index.len(), self.arena.len());
    }
}
