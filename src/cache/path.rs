//! Path Resolver Module
//!
//! Normalizes request paths into cache keys relative to the served root.

use crate::error::{CacheError, Result};

// == Resolve ==
/// Normalizes `raw` into a cache key.
///
/// `.` segments and empty segments are dropped and `..` consumes the previous
/// segment. A relative path that normalizes to nothing becomes `"."`.
///
/// Unless `allow_absolute` is set, absolute paths and paths that escape the
/// root through a leading `..` fail with [`CacheError::AccessDenied`].
pub fn resolve(raw: &str, allow_absolute: bool) -> Result<String> {
    let absolute = raw.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                // `/..` stays at the filesystem root
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    if !allow_absolute && (absolute || parts.first() == Some(&"..")) {
        return Err(CacheError::AccessDenied(raw.to_string()));
    }

    let joined = parts.join("/");
    Ok(if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    })
}

// == Join ==
/// Appends a child name to a cache key.
pub fn join(key: &str, name: &str) -> String {
    if key == "." {
        name.to_string()
    } else if key.ends_with('/') {
        format!("{}{}", key, name)
    } else {
        format!("{}/{}", key, name)
    }
}
