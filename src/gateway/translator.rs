//! Request translation.
//!
//! # Responsibilities
//! - Decode, validate and re-encode path params into the upstream path
//! - Forward or drop the inbound query string per route
//! - Parse declared bodies and re-serialize them as JSON
//! - Apply the header allowlist and session propagation
//!
//! # Design Decisions
//! - Pure transformation: no cache or network access
//! - Buffered routes read the inbound body exactly once, capped in size;
//!   streaming routes hand the body through untouched

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{header, request::Parts, HeaderMap, HeaderValue, Method, Uri};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use crate::cache::key::Tag;
use crate::config::schema::{BodyMode, UpstreamConfig};
use crate::gateway::error::GatewayError;
use crate::routing::matcher::{PathPattern, Template};
use crate::routing::RouteMatch;
use crate::security::headers::forwarded_headers;
use crate::security::SessionExtractor;

/// RFC 3986 `pchar` minus the characters that must be encoded in a segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// A decoded path parameter and its upstream encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParam {
    pub name: String,
    /// Decoded value; catch-all params keep their `/` separators.
    pub value: String,
    /// Segment-encoded value for the upstream path.
    pub encoded: String,
}

/// Decoded params of a matched route.
#[derive(Debug, Clone, Default)]
pub struct PathParams(Vec<PathParam>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&PathParam> {
        self.0.iter().find(|p| p.name == name)
    }

    /// Render tag templates with decoded values.
    pub fn render_tags(&self, templates: &[Template]) -> Result<Vec<Tag>, GatewayError> {
        templates
            .iter()
            .map(|t| {
                t.render(|name| self.get(name).map(|p| Cow::Borrowed(p.value.as_str())))
                    .map(Tag::from)
                    .ok_or_else(|| {
                        GatewayError::Internal(format!("tag `{}` has unbound parameters", t.as_str()))
                    })
            })
            .collect()
    }
}

/// Body of a forwarded request.
#[derive(Debug)]
pub enum ForwardBody {
    Empty,
    Buffered(Bytes),
    Streaming(Body),
}

/// The upstream request produced for one inbound call.
#[derive(Debug)]
pub struct ForwardedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: ForwardBody,
}

impl ForwardedRequest {
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, ForwardBody::Streaming(_))
    }
}

/// Everything the gateway needs after translation.
#[derive(Debug)]
pub struct Translated {
    pub request: ForwardedRequest,
    pub params: PathParams,
    /// Authorization value sent upstream, used to scope per-session cache keys.
    pub session: Option<HeaderValue>,
}

impl Translated {
    /// Upstream path and forwarded query, the inputs of the cache key.
    pub fn upstream_target(&self) -> (&str, Option<&str>) {
        (self.request.uri.path(), self.request.uri.query())
    }
}

/// Builds upstream requests from inbound ones.
#[derive(Debug, Clone)]
pub struct RequestTranslator {
    base: String,
    session: SessionExtractor,
    max_body_size: usize,
}

impl RequestTranslator {
    pub fn new(upstream: &UpstreamConfig, session: SessionExtractor, max_body_size: usize) -> Self {
        let base = format!(
            "{}{}",
            upstream.base_url.trim_end_matches('/'),
            upstream.api_prefix.trim_end_matches('/')
        );
        Self {
            base,
            session,
            max_body_size,
        }
    }

    pub async fn translate(
        &self,
        matched: &RouteMatch,
        parts: &Parts,
        body: Body,
        peer: Option<SocketAddr>,
    ) -> Result<Translated, GatewayError> {
        let route = &matched.route;
        let params = decode_params(&route.pattern, &matched.raw_params)?;
        let uri = self.upstream_uri(&route.upstream, &params, route.forward_query, parts)?;

        let session = self.session.authorization(&parts.headers);
        if route.auth && session.is_none() {
            return Err(GatewayError::MissingSession);
        }

        let pipe_body = route.streaming && route.is_mutating();
        let mut headers = forwarded_headers(&parts.headers, pipe_body, peer);
        if let Some(auth) = &session {
            headers.insert(header::AUTHORIZATION, auth.clone());
        }

        let body = if pipe_body {
            ForwardBody::Streaming(body)
        } else {
            match route.body {
                BodyMode::None => ForwardBody::Empty,
                BodyMode::Json => {
                    let bytes = self.read_body(body).await?;
                    match reencode_json(&parts.headers, &bytes)? {
                        Some(json) => {
                            headers.insert(
                                header::CONTENT_TYPE,
                                HeaderValue::from_static("application/json"),
                            );
                            ForwardBody::Buffered(json)
                        }
                        None => ForwardBody::Empty,
                    }
                }
            }
        };

        Ok(Translated {
            request: ForwardedRequest {
                method: route.method.clone(),
                uri,
                headers,
                body,
            },
            params,
            session,
        })
    }

    /// The inbound query is appended byte for byte; it is never re-encoded.
    fn upstream_uri(
        &self,
        template: &Template,
        params: &PathParams,
        forward_query: bool,
        parts: &Parts,
    ) -> Result<Uri, GatewayError> {
        let path = template
            .render(|name| params.get(name).map(|p| Cow::Borrowed(p.encoded.as_str())))
            .ok_or_else(|| {
                GatewayError::Internal(format!("upstream path `{}` has unbound parameters", template.as_str()))
            })?;

        let mut target = format!("{}{}", self.base, path);
        if let Some(query) = parts.uri.query().filter(|q| forward_query && !q.is_empty()) {
            target.push('?');
            target.push_str(query);
        }
        Uri::try_from(target)
            .map_err(|e| GatewayError::Internal(format!("invalid upstream URI: {e}")))
    }

    async fn read_body(&self, body: Body) -> Result<Bytes, GatewayError> {
        let limit = self.max_body_size;
        let collected = Limited::new(body, limit).collect().await.map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                GatewayError::PayloadTooLarge { limit }
            } else {
                GatewayError::MalformedBody(format!("failed to read body: {e}"))
            }
        })?;
        Ok(collected.to_bytes())
    }
}

fn decode_params(pattern: &PathPattern, raw: &[(String, String)]) -> Result<PathParams, GatewayError> {
    let rest_name = pattern.rest_param();
    let mut params = Vec::with_capacity(raw.len());
    for (name, value) in raw {
        let param = if Some(name.as_str()) == rest_name {
            let mut decoded = Vec::new();
            let mut encoded = Vec::new();
            for segment in value.split('/') {
                let (d, e) = decode_segment(name, segment)?;
                decoded.push(d);
                encoded.push(e);
            }
            PathParam {
                name: name.clone(),
                value: decoded.join("/"),
                encoded: encoded.join("/"),
            }
        } else {
            let (value, encoded) = decode_segment(name, value)?;
            PathParam {
                name: name.clone(),
                value,
                encoded,
            }
        };
        params.push(param);
    }
    Ok(PathParams(params))
}

/// Decode one raw segment and re-encode it for the upstream path.
fn decode_segment(name: &str, raw: &str) -> Result<(String, String), GatewayError> {
    let invalid = |reason| GatewayError::InvalidPathParameter {
        name: name.to_string(),
        reason,
    };

    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| invalid("not valid UTF-8"))?;
    if decoded.is_empty() {
        return Err(invalid("empty segment"));
    }
    if decoded.chars().any(char::is_control) {
        return Err(invalid("contains a control character"));
    }
    if decoded == "." || decoded == ".." {
        return Err(invalid("dot segments are not allowed"));
    }

    let encoded = utf8_percent_encode(&decoded, SEGMENT).to_string();
    Ok((decoded.into_owned(), encoded))
}

/// Parse a JSON or form body and serialize it as JSON. `None` for an empty body.
fn reencode_json(headers: &HeaderMap, bytes: &Bytes) -> Result<Option<Bytes>, GatewayError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase());

    let value = match content_type.as_deref() {
        None | Some("application/json") => serde_json::from_slice::<Value>(bytes)
            .map_err(|e| GatewayError::MalformedBody(format!("invalid JSON: {e}")))?,
        Some("application/x-www-form-urlencoded") => form_to_json(bytes),
        Some(other) if other.ends_with("+json") => serde_json::from_slice::<Value>(bytes)
            .map_err(|e| GatewayError::MalformedBody(format!("invalid JSON: {e}")))?,
        Some(other) => {
            return Err(GatewayError::MalformedBody(format!(
                "unsupported content type `{other}`"
            )))
        }
    };

    serde_json::to_vec(&value)
        .map(|v| Some(Bytes::from(v)))
        .map_err(|e| GatewayError::Internal(format!("failed to serialize body: {e}")))
}

/// Repeated form keys become arrays.
fn form_to_json(bytes: &[u8]) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(map)
}
