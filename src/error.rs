//! Error types for the file server
//!
//! Provides unified error handling using thiserror. Every error originates at
//! the filesystem boundary or in path resolution; cache accounting never fails.

use std::io;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

// == Cache Error Enum ==
/// Unified error type for the file cache and server.
///
/// Cloneable so that a single shared metadata fetch can hand its outcome to
/// every request waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Missing path or filesystem entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Path escapes the served root
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Any other filesystem failure
    #[error("I/O failure: {0}")]
    Io(String),
}

impl CacheError {
    // == From I/O ==
    /// Maps an I/O error raised while touching `path`.
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => CacheError::NotFound(path.to_string()),
            _ => CacheError::Io(format!("{}: {}", path, err)),
        }
    }

    /// Returns true for the errors rendered as a not-found page.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_) | CacheError::AccessDenied(_))
    }
}

// == HTML Helpers ==
/// Escapes text for inclusion in an HTML body.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Builds an uncacheable HTML response.
pub fn html_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/html"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        match &self {
            CacheError::NotFound(path) | CacheError::AccessDenied(path) => html_response(
                StatusCode::NOT_FOUND,
                format!("<body>File not found: {}", escape_html(path)),
            ),
            CacheError::Io(detail) => {
                error!("Internal error: {}", detail);
                html_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("<body>Internal Server Error<br>{}", escape_html(detail)),
                )
            }
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the file server.
pub type Result<T> = std::result::Result<T, CacheError>;
