//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay buffered upstream responses to the caller
//! - Rebuild responses from cache entries
//! - Mark every cacheable-route response with its cache outcome
//!
//! # Design Decisions
//! - Status, headers and body are relayed verbatim; upstream error bodies
//!   are never rewritten
//! - Hop-by-hop headers are already stripped by the upstream client

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue},
    response::Response,
};
use tokio::time::Instant;

use crate::cache::CacheEntry;
use crate::gateway::client::BufferedResponse;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Outcome of the cache for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// Lookup skipped (force-fresh, streaming, or no shareable key).
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

pub fn with_cache_status(mut response: Response, status: CacheStatus) -> Response {
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(status.as_str()));
    response
}

/// Relay a buffered upstream response.
pub fn from_upstream(upstream: BufferedResponse) -> Response {
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = upstream.headers;
    response
}

/// Serve a cache hit, with `age` set to the entry's time in the cache.
pub fn from_cache(entry: &CacheEntry) -> Response {
    let mut response = Response::new(Body::from(entry.body.clone()));
    *response.status_mut() = entry.status;
    *response.headers_mut() = entry.headers.clone();
    response
        .headers_mut()
        .insert(header::AGE, HeaderValue::from(entry.age(Instant::now()).as_secs()));
    with_cache_status(response, CacheStatus::Hit)
}
