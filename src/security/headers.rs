//! Header forwarding rules.
//!
//! # Responsibilities
//! - Forward only allowlisted inbound headers upstream
//! - Generate X-Forwarded-For from the peer address
//! - Strip hop-by-hop headers from upstream responses
//!
//! # Design Decisions
//! - Never trust existing X-Forwarded-* from callers
//! - Set-Cookie is relayed to the caller but never stored in the cache

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// When an allowlisted header is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardRule {
    /// Forwarded whenever present.
    Always,
    /// Forwarded only when the raw inbound body is piped through.
    StreamingBody,
}

/// Inbound headers that may reach the upstream. Anything absent is dropped.
///
/// `authorization` is handled by the session extractor and `content-type`
/// for JSON routes is set by the translator.
pub static FORWARDED_HEADERS: [(HeaderName, ForwardRule); 6] = [
    (header::ACCEPT, ForwardRule::Always),
    (header::ACCEPT_LANGUAGE, ForwardRule::Always),
    (X_REQUEST_ID, ForwardRule::Always),
    (header::CONTENT_TYPE, ForwardRule::StreamingBody),
    (header::CONTENT_LENGTH, ForwardRule::StreamingBody),
    (header::CONTENT_DISPOSITION, ForwardRule::StreamingBody),
];

static HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Build the upstream header set from the allowlist.
pub fn forwarded_headers(
    inbound: &HeaderMap,
    streaming_body: bool,
    peer: Option<SocketAddr>,
) -> HeaderMap {
    let mut out = HeaderMap::new();

    for (name, rule) in FORWARDED_HEADERS.iter() {
        if *rule == ForwardRule::StreamingBody && !streaming_body {
            continue;
        }
        for value in inbound.get_all(name) {
            out.append(name.clone(), value.clone());
        }
    }

    if let Some(peer) = peer {
        if let Ok(value) = HeaderValue::from_str(&peer.ip().to_string()) {
            out.insert(X_FORWARDED_FOR, value);
        }
    }
    out
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(listed.iter()) {
        headers.remove(name);
    }
}

/// Headers safe to store alongside a cached body.
pub fn cacheable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    strip_hop_by_hop(&mut out);
    out.remove(header::SET_COOKIE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("ko-KR"));
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token=abc; theme=dark"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("multipart/form-data"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert("x-next-internal", HeaderValue::from_static("secret"));
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("6.6.6.6"));
        headers
    }

    #[test]
    fn test_allowlist_drops_everything_else() {
        let out = forwarded_headers(&inbound(), false, None);

        assert_eq!(out[header::ACCEPT], "application/json");
        assert_eq!(out[header::ACCEPT_LANGUAGE], "ko-KR");
        assert!(out.get(header::COOKIE).is_none());
        assert!(out.get(header::USER_AGENT).is_none());
        assert!(out.get("x-next-internal").is_none());
        assert!(out.get(header::CONTENT_TYPE).is_none());
        assert!(out.get(X_FORWARDED_FOR).is_none());
    }

    #[test]
    fn test_streaming_keeps_body_headers() {
        let peer: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        let out = forwarded_headers(&inbound(), true, Some(peer));

        assert_eq!(out[header::CONTENT_TYPE], "multipart/form-data");
        // Caller-supplied X-Forwarded-For is replaced
        assert_eq!(out[X_FORWARDED_FOR], "10.0.0.7");
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn test_cacheable_headers_drop_set_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::SET_COOKIE, HeaderValue::from_static("access_token=new"));
        headers.insert(header::ETAG, HeaderValue::from_static("\"v1\""));

        let stored = cacheable_headers(&headers);
        assert!(stored.get(header::SET_COOKIE).is_none());
        assert_eq!(stored[header::ETAG], "\"v1\"");
    }
}
