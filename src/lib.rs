//! Cacheweb - A static file server with a frequency-weighted file cache
//!
//! Serves a directory over HTTP, keeping hot files in a size-bounded memory
//! cache whose admission and eviction are driven by decaying hit counts.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod mime;
pub mod tasks;

pub use api::AppState;
pub use cache::FileCache;
pub use config::Config;
