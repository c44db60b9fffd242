//! Cache keys and invalidation tags.

use std::fmt;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic key derived from method, upstream path and forwarded query.
///
/// The query is normalized by sorting its `&`-separated pairs, so `?b=2&a=1`
/// and `?a=1&b=2` address the same entry. Values are kept percent-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &Method, upstream_path: &str, query: Option<&str>) -> Self {
        let mut key = format!("{} {}", method, upstream_path);
        if let Some(query) = query.map(normalize_query).filter(|q| !q.is_empty()) {
            key.push('?');
            key.push_str(&query);
        }
        Self(key)
    }

    /// Scope the key to one session so per-user payloads are never shared.
    pub fn scoped_to_session(mut self, token: &str) -> Self {
        let digest = Sha256::digest(token.as_bytes());
        self.0.push_str(" #session=");
        self.0.push_str(&hex::encode(&digest[..16]));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    pairs.join("&")
}

/// Invalidation group identifier, e.g. `admin:departments`.
///
/// Case-sensitive and matched exactly; there is no prefix or wildcard form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for Tag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
