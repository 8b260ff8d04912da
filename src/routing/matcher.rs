//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix (case-sensitive, literal)
//! - Normalize the trailing-slash variant of a route path
//! - Percent-decode request paths before they are matched
//!
//! # Design Decisions
//! - Path matching is a raw string prefix test, not segment-aware:
//!   `/mcp` also matches `/mcpx`. Kept as-is for compatibility with
//!   existing configurations.
//! - No regex to guarantee O(n) matching
//! - Matching sees the decoded path (`/m%63p` is `/mcp`); the request is
//!   still forwarded with the path the client sent.

use std::borrow::Cow;

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns true if `path` starts with the configured prefix.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Strip the single trailing slash from `route_path + "/"`.
    ///
    /// Some clients probe MCP endpoints with a trailing slash while upstreams
    /// are strict about it. Any other sub-path passes through untouched.
    pub fn normalize<'a>(&self, path: &'a str) -> Cow<'a, str> {
        if self.prefix == "/" {
            return Cow::Borrowed(path);
        }
        match path.strip_suffix('/') {
            Some(stripped) if stripped == self.prefix => Cow::Owned(stripped.to_string()),
            _ => Cow::Borrowed(path),
        }
    }
}

/// Percent-decode a request path for matching.
///
/// Malformed escapes are kept literally. Decoded bytes that are not UTF-8
/// are replaced, so such a path can only match a route that spells them out.
pub fn decode_path(path: &str) -> Cow<'_, str> {
    if !path.contains('%') {
        return Cow::Borrowed(path);
    }

    let bytes = path.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = match (bytes[i], bytes.get(i + 1), bytes.get(i + 2)) {
            (b'%', Some(&hi), Some(&lo)) => hex_value(hi).zip(hex_value(lo)),
            _ => None,
        };
        match escaped {
            Some((hi, lo)) => {
                decoded.push((hi << 4) | lo);
                i += 3;
            }
            None => {
                decoded.push(bytes[i]);
                i += 1;
            }
        }
    }

    match String::from_utf8_lossy(&decoded) {
        Cow::Borrowed(s) => Cow::Owned(s.to_string()),
        Cow::Owned(s) => Cow::Owned(s),
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
