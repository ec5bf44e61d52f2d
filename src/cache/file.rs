//! File Cache Module
//!
//! Async service object tying the [`CacheStore`] to the filesystem.
//!
//! The store lock is never held across a filesystem call, so every store
//! mutation is atomic with respect to other requests while stats and reads
//! proceed concurrently.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::fs;
use tokio::sync::Mutex;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::cache::entry::{EntryId, FileMeta, PendingMeta};
use crate::cache::{path, CacheStats, CacheStore, DECAY_INTERVAL};
use crate::config::Config;
use crate::error::{escape_html, CacheError, Result};
use crate::mime::MimeResolver;
use crate::tasks::DecayTimer;

// == HTTP Date ==
/// Formats a timestamp as an IMF-fixdate, as used by `Last-Modified`.
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

// == File Info ==
/// What a request learns from one metadata refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub meta: FileMeta,
    /// Resolved content type, None = unknown binary
    pub mime: Option<String>,
    /// Whether the content is served from memory
    pub cachable: bool,
}

impl FileInfo {
    pub fn is_directory(&self) -> bool {
        self.meta.is_directory
    }

    /// `Last-Modified` header value, if the modification time is known.
    pub fn last_modified(&self) -> Option<String> {
        self.meta.modified.map(http_date)
    }
}

// == File Cache ==
/// Process-wide file cache, cheap to clone and share between handlers.
#[derive(Clone)]
pub struct FileCache {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<Mutex<CacheStore>>,
    root: PathBuf,
    mime: MimeResolver,
    decay: DecayTimer,
}

impl FileCache {
    // == Constructor ==
    /// Creates a cache serving `root` within `budget` bytes.
    pub fn new(root: impl Into<PathBuf>, budget: u64, mime: MimeResolver) -> Self {
        Self::with_decay_interval(root, budget, mime, DECAY_INTERVAL)
    }

    /// Creates a cache whose hit counts decay after `interval` without access.
    pub fn with_decay_interval(
        root: impl Into<PathBuf>,
        budget: u64,
        mime: MimeResolver,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Arc::new(Mutex::new(CacheStore::new(budget))),
                root: root.into(),
                mime,
                decay: DecayTimer::new(interval),
            }),
        }
    }

    /// Creates a cache from the server configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.root.clone(),
            config.cache_budget,
            MimeResolver::new(&config.mime),
        )
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> &Arc<Mutex<CacheStore>> {
        &self.inner.store
    }

    // == Get ==
    /// Returns the handle for `raw`, registering the path on first use.
    ///
    /// Never touches the filesystem; fails only when the path escapes the root.
    pub async fn get(&self, raw: &str, allow_absolute: bool) -> Result<CachedFile> {
        let key = path::resolve(raw, allow_absolute)?;
        let file = CachedFile {
            cache: self.clone(),
            full_path: self.full_path(&key),
            key,
        };
        {
            let mut store = self.inner.store.lock().await;
            file.entry_id(&mut store);
        }
        Ok(file)
    }

    // == Stats ==
    /// Returns a snapshot of the cache accounting.
    pub async fn stats(&self) -> CacheStats {
        self.inner.store.lock().await.stats()
    }

    /// Returns true while the decay timer is armed.
    pub fn decay_scheduled(&self) -> bool {
        self.inner.decay.is_running()
    }

    /// Cancels the decay timer until the next access.
    pub fn stop_decay(&self) {
        self.inner.decay.stop();
    }

    fn full_path(&self, key: &str) -> PathBuf {
        if key.starts_with('/') {
            PathBuf::from(key)
        } else if key == "." {
            self.inner.root.clone()
        } else {
            self.inner.root.join(key)
        }
    }
}

// == Cached File ==
/// Handle to one tracked path.
///
/// Holds the key rather than the entry itself; if the entry is evicted while
/// a request is in flight it is recreated on the next store access.
#[derive(Clone)]
pub struct CachedFile {
    cache: FileCache,
    key: String,
    full_path: PathBuf,
}

impl CachedFile {
    /// Normalized cache key.
    pub fn key(&self) -> &str {
        &self.key
    }

    // == Refresh Metadata ==
    /// Stats the file, reusing an in-flight or recent stat, and records the
    /// access with the cache. Failed stats are recorded too.
    pub async fn refresh_metadata(&self) -> Result<FileInfo> {
        let fetch = {
            let mut store = self.cache.inner.store.lock().await;
            let id = self.entry_id(&mut store);
            match store.pending_fetch(id, Instant::now()) {
                Some(fetch) => fetch,
                None => {
                    let fetch = stat(self.full_path.clone(), self.key.clone());
                    store.start_fetch(id, fetch.clone());
                    fetch
                }
            }
        };

        let result = fetch.clone().await;

        let info = {
            let mut store = self.cache.inner.store.lock().await;
            let id = self.entry_id(&mut store);
            store.apply_fetch(id, &fetch, &result, Instant::now());
            let cachable = store.hit(id);
            let mime = store.entry(id).mime.clone();
            result.map(|meta| FileInfo {
                meta,
                mime,
                cachable,
            })
        };

        self.cache
            .inner
            .decay
            .reschedule(self.cache.inner.store.clone());
        info
    }

    // == Read ==
    /// Returns the file content, from memory when the cached copy matches the
    /// last observed modification stamp.
    pub async fn read(&self) -> Result<Bytes> {
        let stamp = {
            let mut store = self.cache.inner.store.lock().await;
            let id = self.entry_id(&mut store);
            let entry = store.entry(id);
            if let Some(content) = entry.valid_content() {
                return Ok(content);
            }
            entry.meta.mod_stamp
        };

        let data = Bytes::from(
            fs::read(&self.full_path)
                .await
                .map_err(|e| CacheError::from_io(&self.key, e))?,
        );

        let mut store = self.cache.inner.store.lock().await;
        let id = self.entry_id(&mut store);
        store.store_content(id, data.clone(), stamp);
        Ok(data)
    }

    // == Read Directory Listing ==
    /// Returns an HTML listing of the directory, rendered once per
    /// modification stamp.
    pub async fn read_directory_listing(&self) -> Result<Bytes> {
        let stamp = {
            let mut store = self.cache.inner.store.lock().await;
            let id = self.entry_id(&mut store);
            let entry = store.entry(id);
            if let Some(content) = entry.valid_content() {
                return Ok(content);
            }
            entry.meta.mod_stamp
        };

        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.full_path)
            .await
            .map_err(|e| CacheError::from_io(&self.key, e))?;
        while let Some(child) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::from_io(&self.key, e))?
        {
            names.push(child.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        let data = Bytes::from(render_listing(&self.key, &names));
        debug!("Rendered listing of {} ({} entries)", self.key, names.len());

        let mut store = self.cache.inner.store.lock().await;
        let id = self.entry_id(&mut store);
        store.store_listing(id, data.clone(), stamp);
        Ok(data)
    }

    // == Open Stream ==
    /// Opens the file for streaming without involving the cache.
    pub async fn open_stream(&self) -> Result<ReaderStream<fs::File>> {
        let file = fs::File::open(&self.full_path)
            .await
            .map_err(|e| CacheError::from_io(&self.key, e))?;
        Ok(ReaderStream::new(file))
    }

    fn entry_id(&self, store: &mut CacheStore) -> EntryId {
        let mime = &self.cache.inner.mime;
        store.get_or_insert(&self.key, |key| mime.lookup(key))
    }
}

/// Starts a shareable stat of `full_path`.
fn stat(full_path: PathBuf, key: String) -> PendingMeta {
    async move {
        fs::metadata(&full_path)
            .await
            .map(|meta| FileMeta::from_std(&meta))
            .map_err(|e| CacheError::from_io(&key, e))
    }
    .boxed()
    .shared()
}

/// Renders a minimal hyperlink listing of `names` inside directory `key`.
fn render_listing(key: &str, names: &[String]) -> String {
    let base = if key == "." {
        String::new()
    } else {
        let encoded: Vec<String> = key
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/", encoded.join("/"))
    };

    let mut html = String::from("<body>");
    for name in names {
        html.push_str(&format!(
            "<a href=\"/{}{}\">{}</a><br>",
            base,
            urlencoding::encode(name),
            escape_html(name)
        ));
    }
    html
}
