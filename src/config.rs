//! Configuration Module
//!
//! Loads server configuration from an optional JSON file and environment
//! variables.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, warn};

use crate::cache::DEFAULT_BUDGET;

/// Name of the optional configuration file in the working directory.
pub const CONFIG_FILE: &str = ".cachewebrc.json";

/// Server configuration parameters.
///
/// All values can be configured via the JSON file or environment variables
/// with sensible defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directory served as the URL root
    pub root: PathBuf,
    /// HTTP server port
    pub port: u16,
    /// Page served for missing files, relative to the root or absolute
    #[serde(rename = "404")]
    pub not_found_page: Option<String>,
    /// Document served for directory requests
    pub index: Option<String>,
    /// Whether directories without an index are listed
    pub show_directory: bool,
    /// Byte budget of the file cache
    pub cache_budget: u64,
    /// Glob pattern to MIME type for unknown extensions, in file order
    pub mime: IndexMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            port: 8080,
            not_found_page: Some("404.html".to_string()),
            index: Some("index.html".to_string()),
            show_directory: true,
            cache_budget: DEFAULT_BUDGET,
            mime: IndexMap::new(),
        }
    }
}

impl Config {
    /// Loads the configuration file if present, then applies environment
    /// overrides and makes the root absolute.
    pub fn load() -> Self {
        let base = match Self::from_file(Path::new(CONFIG_FILE)) {
            Ok(Some(config)) => {
                info!("{} loaded", CONFIG_FILE);
                config
            }
            Ok(None) => Config::default(),
            Err(err) => {
                warn!("{} is invalid: {}", CONFIG_FILE, err);
                Config::default()
            }
        };
        let mut config = base.with_env();
        config.root = absolute_root(&config.root);
        config
    }

    /// Reads a JSON configuration file; a missing file yields `Ok(None)`.
    pub fn from_file(path: &Path) -> anyhow::Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Applies environment variable overrides.
    ///
    /// # Environment Variables
    /// - `CACHEWEB_ROOT` - Served directory
    /// - `CACHEWEB_PORT` - HTTP server port
    /// - `CACHEWEB_NOT_FOUND_PAGE` - Custom 404 page, empty disables
    /// - `CACHEWEB_INDEX` - Directory index document, empty disables
    /// - `CACHEWEB_SHOW_DIRECTORY` - `true`/`false`
    /// - `CACHEWEB_CACHE_BUDGET` - Cache budget in bytes
    pub fn with_env(mut self) -> Self {
        if let Ok(root) = env::var("CACHEWEB_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(port) = parsed("CACHEWEB_PORT") {
            self.port = port;
        }
        if let Ok(page) = env::var("CACHEWEB_NOT_FOUND_PAGE") {
            self.not_found_page = non_empty(page);
        }
        if let Ok(index) = env::var("CACHEWEB_INDEX") {
            self.index = non_empty(index);
        }
        if let Some(show) = parsed("CACHEWEB_SHOW_DIRECTORY") {
            self.show_directory = show;
        }
        if let Some(budget) = parsed("CACHEWEB_CACHE_BUDGET") {
            self.cache_budget = budget;
        }
        self
    }
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return root.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(root))
        .unwrap_or_else(|_| root.to_path_buf())
}
