//! Stream passthrough for large bodies.
//!
//! # Responsibilities
//! - Relay the upstream response body to the caller chunk by chunk
//! - Turn a mid-stream upstream failure into an aborted response
//!
//! # Design Decisions
//! - Streaming responses are never cached
//! - Upstream `content-length` is kept, so a truncated body can never be
//!   mistaken for a complete one; on error the connection is reset

use axum::{body::Body, response::Response};
use futures_util::TryStreamExt;

use crate::gateway::client::UpstreamResponse;
use crate::http::response::{with_cache_status, CacheStatus};
use crate::observability::metrics;

/// Build a caller response whose body is piped from the upstream.
pub fn relay(route: &str, upstream: UpstreamResponse) -> Response {
    let (status, headers, chunks) = upstream.into_stream();
    let route = route.to_string();

    let body = Body::from_stream(chunks.inspect_err(move |e| {
        tracing::warn!(route = %route, error = %e, "Upstream stream interrupted, aborting response");
        metrics::record_upstream_error("stream_interrupted");
    }));

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    with_cache_status(response, CacheStatus::Bypass)
}
