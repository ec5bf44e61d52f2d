//! MIME Resolver
//!
//! Maps file paths to content types through the `mime_guess` extension
//! database, falling back to configured glob patterns.

use indexmap::IndexMap;
use tracing::debug;

// == Mime Resolver ==
/// Resolves content types for cache keys.
#[derive(Debug, Clone, Default)]
pub struct MimeResolver {
    /// Glob pattern to MIME type, tried in configuration order when the
    /// extension is unknown
    overrides: Vec<(String, String)>,
}

impl MimeResolver {
    // == Constructor ==
    /// Creates a resolver with the given glob overrides.
    pub fn new(overrides: &IndexMap<String, String>) -> Self {
        Self {
            overrides: overrides
                .iter()
                .map(|(pattern, mime)| (pattern.clone(), mime.clone()))
                .collect(),
        }
    }

    // == Lookup ==
    /// Returns the content type for `path`, or None for unknown binary data.
    pub fn lookup(&self, path: &str) -> Option<String> {
        if let Some(mime) = mime_guess::from_path(path).first_raw() {
            return Some(mime.to_string());
        }

        let found = self
            .overrides
            .iter()
            .find(|(pattern, _)| glob_match(pattern, path))
            .map(|(_, mime)| mime.clone());
        if found.is_none() {
            debug!("Unknown content type for {}", path);
        }
        found
    }
}

/// Matches the whole of `text` against a pattern where `*` matches any run
/// of characters. Every other character, `?` included, matches itself.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(overrides: &[(&str, &str)]) -> MimeResolver {
        let map: IndexMap<String, String> = overrides
            .iter()
            .map(|(pattern, mime)| (pattern.to_string(), mime.to_string()))
            .collect();
        MimeResolver::new(&map)
    }

    #[test]
    fn test_lookup_known_extension() {
        let resolver = MimeResolver::default();
        assert_eq!(resolver.lookup("a/b.html").as_deref(), Some("text/html"));
        assert_eq!(resolver.lookup("logo.PNG").as_deref(), Some("image/png"));
        assert_eq!(resolver.lookup("a/b.txt").as_deref(), Some("text/plain"));
        assert_eq!(resolver.lookup("data/report.csv").as_deref(), Some("text/csv"));
        assert_eq!(resolver.lookup("dist/bundle.zip").as_deref(), Some("application/zip"));
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        let resolver = MimeResolver::default();
        assert!(resolver.lookup("archive.cwdata").is_none());
        assert!(resolver.lookup("Makefile").is_none());
        assert!(resolver.lookup("dir.d/README").is_none());
    }

    #[test]
    fn test_lookup_glob_override() {
        let resolver = resolver(&[
            ("*.cwnote", "text/markdown"),
            ("docs/LICENSE*", "text/plain"),
        ]);

        assert_eq!(resolver.lookup("notes/a.cwnote").as_deref(), Some("text/markdown"));
        assert_eq!(resolver.lookup("docs/LICENSE-MIT").as_deref(), Some("text/plain"));
        assert!(resolver.lookup("LICENSE").is_none());
    }

    #[test]
    fn test_overrides_tried_in_configuration_order() {
        let docs_first = resolver(&[("docs/*", "text/plain"), ("*.cwnote", "text/markdown")]);
        assert_eq!(docs_first.lookup("docs/a.cwnote").as_deref(), Some("text/plain"));

        let ext_first = resolver(&[("*.cwnote", "text/markdown"), ("docs/*", "text/plain")]);
        assert_eq!(ext_first.lookup("docs/a.cwnote").as_deref(), Some("text/markdown"));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*.tar.*", "x.tar.gz"));
        assert!(!glob_match("*.tar", "x.tar.gz"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("abc", "abcd"));
    }

    #[test]
    fn test_glob_question_mark_is_literal() {
        assert!(glob_match("what?.txt", "what?.txt"));
        assert!(!glob_match("a?c", "abc"));
    }
}
