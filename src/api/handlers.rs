//! API Handlers
//!
//! Serves files from the configured root through the [`FileCache`].

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::cache::{path, CachedFile, FileCache, FileInfo};
use crate::config::Config;
use crate::error::{escape_html, html_response, CacheError, Result};

/// Application state shared across all handlers.
///
/// The cache is internally synchronized; the configuration is read-only.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide file cache
    pub cache: FileCache,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates a new AppState with the given cache and configuration.
    pub fn new(cache: FileCache, config: Config) -> Self {
        Self {
            cache,
            config: Arc::new(config),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Initializes the file cache with the root, budget and MIME overrides
    /// from the Config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(FileCache::from_config(config), config.clone())
    }
}

/// Handler for every request path.
///
/// Missing and escaping paths render the not-found page; other failures
/// render a server error.
pub async fn serve_handler(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let pathname = request_path(uri.path());

    match serve_path(&state, &pathname, &headers).await {
        Ok(response) => response,
        Err(err) if err.is_not_found() => not_found(&state, &pathname, &headers).await,
        Err(err) => err.into_response(),
    }
}

/// Maps a URI path to a root-relative request path.
fn request_path(uri_path: &str) -> String {
    let decoded = urlencoding::decode(uri_path)
        .map(|path| path.into_owned())
        .unwrap_or_else(|_| uri_path.to_string());
    if decoded == "/" {
        ".".to_string()
    } else {
        decoded.strip_prefix('/').unwrap_or(&decoded).to_string()
    }
}

async fn serve_path(state: &AppState, pathname: &str, headers: &HeaderMap) -> Result<Response> {
    let file = state.cache.get(pathname, false).await?;
    let info = file.refresh_metadata().await?;

    if info.is_directory() {
        if let Some(index) = &state.config.index {
            let index_file = state.cache.get(&path::join(file.key(), index), false).await?;
            match index_file.refresh_metadata().await {
                Ok(index_info) if index_info.is_directory() => {
                    return Err(CacheError::NotFound(pathname.to_string()));
                }
                Ok(index_info) => {
                    return send_file(StatusCode::OK, &index_file, &index_info, headers).await;
                }
                Err(CacheError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        if !state.config.show_directory {
            return Err(CacheError::NotFound(pathname.to_string()));
        }
    }

    send_file(StatusCode::OK, &file, &info, headers).await
}

/// Serves the configured not-found page, or a generic one if it cannot be read.
async fn not_found(state: &AppState, pathname: &str, headers: &HeaderMap) -> Response {
    if let Some(page) = &state.config.not_found_page {
        match send_not_found_page(state, page, headers).await {
            Ok(response) => return response,
            Err(err) => debug!("Custom not-found page unavailable: {}", err),
        }
    }
    html_response(
        StatusCode::NOT_FOUND,
        format!("<body>File not found: {}", escape_html(pathname)),
    )
}

async fn send_not_found_page(state: &AppState, page: &str, headers: &HeaderMap) -> Result<Response> {
    let file = state.cache.get(page, true).await?;
    let info = file.refresh_metadata().await?;
    send_file(StatusCode::NOT_FOUND, &file, &info, headers).await
}

/// Builds the response for a file or directory.
///
/// Cachable content is buffered through the cache, anything else is streamed
/// from disk; the headers are the same either way.
async fn send_file(
    status: StatusCode,
    file: &CachedFile,
    info: &FileInfo,
    headers: &HeaderMap,
) -> Result<Response> {
    let last_modified = info.last_modified();

    if let (Some(modified), Some(since)) = (&last_modified, headers.get(header::IF_MODIFIED_SINCE)) {
        if since.to_str().ok() == Some(modified.as_str()) {
            return Ok((
                StatusCode::NOT_MODIFIED,
                [(header::CACHE_CONTROL, "must-revalidate")],
            )
                .into_response());
        }
    }

    let mut builder = Response::builder()
        .status(status)
        .header(header::CACHE_CONTROL, "must-revalidate");
    if let Some(modified) = &last_modified {
        builder = builder.header(header::LAST_MODIFIED, modified.as_str());
    }

    let body = if info.is_directory() {
        let content = file.read_directory_listing().await?;
        builder = builder
            .header(header::CONTENT_TYPE, "text/html")
            .header(header::CONTENT_LENGTH, content.len());
        Body::from(content)
    } else {
        builder = match &info.mime {
            Some(mime) => builder.header(header::CONTENT_TYPE, mime.as_str()),
            None => builder
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}", attachment_name(file.key())),
                ),
        };
        if info.cachable {
            let content = file.read().await?;
            builder = builder.header(header::CONTENT_LENGTH, content.len());
            Body::from(content)
        } else {
            let stream = file.open_stream().await?;
            builder = builder.header(header::CONTENT_LENGTH, info.meta.size);
            Body::from_stream(stream)
        }
    };

    builder
        .body(body)
        .map_err(|e| CacheError::Io(format!("{}: {}", file.key(), e)))
}

/// Reduces the file name to characters safe inside a Content-Disposition.
fn attachment_name(key: &str) -> String {
    key.rsplit('/')
        .next()
        .unwrap_or(key)
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}
