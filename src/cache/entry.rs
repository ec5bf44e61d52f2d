//! Cache Entry Module
//!
//! Defines the per-path cache record and the arena that owns every record.
//! Eviction list links are plain [`EntryId`] fields, never owning references.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use futures::future::{BoxFuture, Shared};

use crate::error::Result;

/// A metadata fetch shared by every request that arrives while it is pending.
pub type PendingMeta = Shared<BoxFuture<'static, Result<FileMeta>>>;

// == File Metadata ==
/// Filesystem metadata observed by a single stat call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMeta {
    /// File length in bytes
    pub size: u64,
    /// Last modification time, if the platform reports one
    pub modified: Option<SystemTime>,
    /// Modification time as nanoseconds since the epoch, 0 = unknown
    pub mod_stamp: u64,
    /// True when the path names a directory
    pub is_directory: bool,
}

impl FileMeta {
    /// Builds metadata from a `std::fs::Metadata`.
    pub fn from_std(meta: &std::fs::Metadata) -> Self {
        let modified = meta.modified().ok();
        Self {
            size: meta.len(),
            modified,
            mod_stamp: modified.map(mod_stamp).unwrap_or(0),
            is_directory: meta.is_dir(),
        }
    }
}

/// Converts a modification time into a comparable stamp.
///
/// Times at or before the epoch collapse to 1 so that 0 keeps meaning "unknown".
pub fn mod_stamp(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
        .max(1)
}

// == Entry Id ==
/// Stable index of an entry inside the [`EntryArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

// == Cache Entry ==
/// The cached record for one filesystem path.
pub struct CacheEntry {
    /// Normalized cache key
    pub path: String,
    /// Resolved content type, None = unknown binary
    pub mime: Option<String>,
    /// Last observed metadata, reset to default on stat failure
    pub meta: FileMeta,
    /// Metadata may be reused without a new stat until this instant
    pub fresh_until: Option<Instant>,
    /// In-flight or most recent metadata fetch
    pub pending: Option<PendingMeta>,
    /// Cached file or listing bytes
    pub content: Option<Bytes>,
    /// Stamp the content was captured at, 0 = never reuse
    pub content_stamp: u64,
    /// Access frequency, incremented per access and halved by decay
    pub hit_count: f64,
    /// Bytes charged against the budget, None = never accessed
    pub charge: Option<u64>,
    /// Admission verdict: whether `content` may be populated and reused
    pub cachable: bool,
    pub(crate) prev: Option<EntryId>,
    pub(crate) next: Option<EntryId>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an uncharged entry with no metadata.
    pub fn new(path: String, mime: Option<String>) -> Self {
        Self {
            path,
            mime,
            meta: FileMeta::default(),
            fresh_until: None,
            pending: None,
            content: None,
            content_stamp: 0,
            hit_count: 0.0,
            charge: None,
            cachable: false,
            prev: None,
            next: None,
        }
    }

    /// Returns the cached content if it is still valid for the current metadata.
    pub fn valid_content(&self) -> Option<Bytes> {
        if self.content_stamp != 0 && self.content_stamp == self.meta.mod_stamp {
            self.content.clone()
        } else {
            None
        }
    }

    /// Returns true once the entry has been charged and joined the eviction list.
    pub fn is_charged(&self) -> bool {
        self.charge.is_some()
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("path", &self.path)
            .field("mime", &self.mime)
            .field("meta", &self.meta)
            .field("pending", &self.pending.is_some())
            .field("content_len", &self.content.as_ref().map(Bytes::len))
            .field("content_stamp", &self.content_stamp)
            .field("hit_count", &self.hit_count)
            .field("charge", &self.charge)
            .field("cachable", &self.cachable)
            .finish()
    }
}

// == Entry Arena ==
/// Owns every entry; freed slots are reused by later insertions.
#[derive(Debug, Default)]
pub struct EntryArena {
    slots: Vec<Option<CacheEntry>>,
    free: Vec<usize>,
    len: usize,
}

impl EntryArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entry and returns its id.
    pub fn insert(&mut self, entry: CacheEntry) -> EntryId {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(entry);
                EntryId(index)
            }
            None => {
                self.slots.push(Some(entry));
                EntryId(self.slots.len() - 1)
            }
        }
    }

    /// Removes an entry, returning it.
    pub fn remove(&mut self, id: EntryId) -> Option<CacheEntry> {
        let entry = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        self.len -= 1;
        Some(entry)
    }

    pub fn get(&self, id: EntryId) -> Option<&CacheEntry> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut CacheEntry> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    /// Iterates over every live entry.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CacheEntry> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::ops::Index<EntryId> for EntryArena {
    type Output = CacheEntry;

    fn index(&self, id: EntryId) -> &CacheEntry {
        self.get(id).expect("dangling entry id")
    }
}

impl std::ops::IndexMut<EntryId> for EntryArena {
    fn index_mut(&mut self, id: EntryId) -> &mut CacheEntry {
        self.get_mut(id).expect("dangling entry id")
    }
}
