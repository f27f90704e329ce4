//! Path matching logic.
//!
//! # Responsibilities
//! - Match a route-group prefix on segment boundaries
//! - Match a route pattern, capturing `:name` segments
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/api/auth` matches `/api/auth` and `/api/auth/...`, never `/api/authx`
//! - A trailing slash is insignificant
//! - No regex to guarantee O(n) matching

use std::collections::HashMap;

/// Matches a route-group prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. Trailing slashes are dropped.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: trimmed.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path remaining under the prefix, or `None` if the prefix does not match.
    ///
    /// The remainder always starts with `/`.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A route pattern such as `/:id/done`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let segments = split(&raw)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Captured params if `path` matches.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = split(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_respects_segment_boundaries() {
        let matcher = PathPrefixMatcher::new("/api/auth/");

        assert_eq!(matcher.strip("/api/auth"), Some("/"));
        assert_eq!(matcher.strip("/api/auth/google"), Some("/google"));
        assert_eq!(matcher.strip("/api/authx"), None);
        assert_eq!(matcher.strip("/images"), None);
    }

    #[test]
    fn test_pattern_captures_params() {
        let pattern = PathPattern::new("/:id/done");

        let params = pattern.matches("/42/done").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert!(pattern.matches("/42").is_none());
        assert!(pattern.matches("/42/undone").is_none());
    }

    #[test]
    fn test_root_pattern_and_trailing_slash() {
        let root = PathPattern::new("/");
        assert!(root.matches("/").is_some());
        assert!(root.matches("/x").is_none());

        let google = PathPattern::new("/google/callback");
        assert!(google.matches("/google/callback/").is_some());
    }
}
