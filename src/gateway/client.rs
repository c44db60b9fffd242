//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Own the pooled connection to the upstream API server
//! - Bound every call with a deadline
//! - Classify transport failures into gateway errors
//!
//! # Design Decisions
//! - One attempt per call, no retries: mutating calls are not idempotent
//! - Redirects are relayed to the caller, never followed
//! - The request URI is sent as built, so a forwarded query keeps its
//!   exact bytes
//! - Buffered routes spend one budget on headers and body together;
//!   streaming routes only bound the wait for response headers
//! - Dropping the returned future or response cancels the upstream call

use std::error::Error as _;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use tokio::time::{self, Instant};

use crate::config::UpstreamConfig;
use crate::gateway::error::GatewayError;
use crate::gateway::translator::{ForwardBody, ForwardedRequest};
use crate::observability::metrics;
use crate::security::headers::strip_hop_by_hop;

/// Response head from the upstream, body not yet read.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: Incoming,
    deadline: Instant,
    budget: Duration,
}

/// A fully read upstream response.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Read the whole body within the remaining request budget.
    pub async fn read_body(self) -> Result<BufferedResponse, GatewayError> {
        let body = match time::timeout_at(self.deadline, self.body.collect()).await {
            Err(_) => {
                metrics::record_upstream_error("timeout");
                return Err(GatewayError::UpstreamTimeout(self.budget));
            }
            Ok(Err(e)) => {
                metrics::record_upstream_error("stream_interrupted");
                return Err(GatewayError::UpstreamStreamInterrupted(e.to_string()));
            }
            Ok(Ok(collected)) => collected.to_bytes(),
        };

        Ok(BufferedResponse {
            status: self.status,
            headers: self.headers,
            body,
        })
    }

    /// Split into the response head and a body stream that yields chunks
    /// as they arrive.
    pub fn into_stream(
        self,
    ) -> (
        StatusCode,
        HeaderMap,
        impl Stream<Item = Result<Bytes, GatewayError>> + Send + 'static,
    ) {
        let stream = self
            .body
            .into_data_stream()
            .map_err(|e| GatewayError::UpstreamStreamInterrupted(e.to_string()));
        (self.status, self.headers, stream)
    }
}

/// Pooled client for the single configured upstream.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_nodelay(true);

        let http = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(connector);

        Self {
            http,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request and wait for the response head.
    pub async fn send(&self, request: ForwardedRequest) -> Result<UpstreamResponse, GatewayError> {
        let deadline = Instant::now() + self.timeout;
        let streaming = request.is_streaming();

        tracing::debug!(
            method = %request.method,
            uri = %request.uri,
            streaming,
            "Sending upstream request"
        );

        let body = match request.body {
            ForwardBody::Empty => Body::empty(),
            ForwardBody::Buffered(bytes) => Body::from(bytes),
            ForwardBody::Streaming(body) => body,
        };
        let mut outbound = Request::builder()
            .method(request.method)
            .uri(request.uri)
            .body(body)
            .map_err(|e| GatewayError::Internal(format!("invalid upstream request: {e}")))?;
        *outbound.headers_mut() = request.headers;

        let response = match time::timeout_at(deadline, self.http.request(outbound)).await {
            Err(_) => {
                metrics::record_upstream_error("timeout");
                return Err(GatewayError::UpstreamTimeout(self.timeout));
            }
            Ok(Err(e)) => return Err(self.classify(e, streaming)),
            Ok(Ok(response)) => response,
        };

        let (parts, body) = response.into_parts();
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        Ok(UpstreamResponse {
            status: parts.status,
            headers,
            body,
            deadline,
            budget: self.timeout,
        })
    }

    fn classify(&self, error: hyper_util::client::legacy::Error, streaming: bool) -> GatewayError {
        let upload_failed = error
            .source()
            .and_then(|cause| cause.downcast_ref::<hyper::Error>())
            .is_some_and(|cause| cause.is_user() || cause.is_body_write_aborted());

        let (kind, mapped) = if error.is_connect() {
            ("unreachable", GatewayError::UpstreamUnreachable(error_chain(&error)))
        } else if streaming && upload_failed {
            (
                "stream_interrupted",
                GatewayError::UpstreamStreamInterrupted(error_chain(&error)),
            )
        } else {
            ("unreachable", GatewayError::UpstreamUnreachable(error_chain(&error)))
        };

        tracing::warn!(kind, error = %mapped, "Upstream request failed");
        metrics::record_upstream_error(kind);
        mapped
    }
}

/// The client's top-level message hides the cause (refused, reset, DNS).
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Uri};

    fn config(base_url: &str, timeout: u64) -> UpstreamConfig {
        UpstreamConfig {
            base_url: base_url.into(),
            request_timeout_secs: timeout,
            connect_timeout_secs: 1,
            ..UpstreamConfig::default()
        }
    }

    fn get(url: &str) -> ForwardedRequest {
        ForwardedRequest {
            method: Method::GET,
            uri: url.parse::<Uri>().unwrap(),
            headers: HeaderMap::new(),
            body: ForwardBody::Empty,
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = format!("http://{addr}");
        let client = UpstreamClient::new(&config(&base, 5));
        let err = client.send(get(&format!("{base}/x"))).await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnreachable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_silent_upstream_times_out() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let base = format!("http://{addr}");
        let client = UpstreamClient::new(&config(&base, 1));
        let err = client.send(get(&format!("{base}/slow"))).await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamTimeout(_)), "{err:?}");
    }
}
