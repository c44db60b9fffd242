//! Per-request cache decisions.

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};

use crate::cache::CacheKey;
use crate::config::schema::CacheScope;
use crate::gateway::translator::Translated;
use crate::routing::spec::CachePolicy;

/// Cache key for a translated request.
///
/// `None` when the route is session-scoped but the request carries no
/// session; such responses are never shared, so they are not cached at all.
pub fn cache_key(policy: &CachePolicy, translated: &Translated) -> Option<CacheKey> {
    let (path, query) = translated.upstream_target();
    let key = CacheKey::new(&translated.request.method, path, query);
    match policy.scope() {
        CacheScope::Shared => Some(key),
        CacheScope::Session => {
            let session = translated.session.as_ref()?;
            Some(key.scoped_to_session(&String::from_utf8_lossy(session.as_bytes())))
        }
    }
}

/// True when the caller asked to skip the cache for this call.
pub fn wants_fresh(headers: &HeaderMap) -> bool {
    let directives = |value: &HeaderValue| {
        value
            .to_str()
            .map(|v| v.split(',').any(|d| d.trim().eq_ignore_ascii_case("no-cache")))
            .unwrap_or(false)
    };
    headers.get_all(header::CACHE_CONTROL).iter().any(directives)
        || headers.get_all(header::PRAGMA).iter().any(directives)
}

/// TTL to store a response for, or `None` if it must not be stored.
pub fn storage_ttl(policy: &CachePolicy, response_headers: &HeaderMap) -> Option<Duration> {
    match policy {
        CachePolicy::None => None,
        CachePolicy::Ttl { ttl, .. } => Some(*ttl),
        CachePolicy::Dynamic { max_ttl, .. } => {
            upstream_max_age(response_headers).map(|age| age.min(*max_ttl))
        }
    }
}

/// Shared max-age from `Cache-Control`, preferring `s-maxage`.
///
/// `no-store`, `no-cache`, `private` or a zero age mean "do not cache".
fn upstream_max_age(headers: &HeaderMap) -> Option<Duration> {
    let mut max_age = None;
    let mut s_maxage = None;

    for value in headers.get_all(header::CACHE_CONTROL) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for directive in value.split(',') {
            let directive = directive.trim();
            let (name, arg) = match directive.split_once('=') {
                Some((name, arg)) => (name.trim(), Some(arg.trim().trim_matches('"'))),
                None => (directive, None),
            };
            match name.to_ascii_lowercase().as_str() {
                "no-store" | "no-cache" | "private" => return None,
                "max-age" => max_age = arg.and_then(|a| a.parse::<u64>().ok()),
                "s-maxage" => s_maxage = arg.and_then(|a| a.parse::<u64>().ok()),
                _ => {}
            }
        }
    }

    s_maxage
        .or(max_age)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
