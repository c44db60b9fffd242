//! Gateway error taxonomy and its HTTP mapping.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Every way a gateway request can fail before an upstream response is relayed.
///
/// Upstream 4xx/5xx responses are not errors; they are passed through verbatim.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route for {0}")]
    RouteNotFound(String),

    #[error("method not allowed")]
    MethodNotAllowed(Vec<Method>),

    #[error("invalid path parameter `{name}`: {reason}")]
    InvalidPathParameter { name: String, reason: &'static str },

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("missing session")]
    MissingSession,

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    #[error("upstream stream interrupted: {0}")]
    UpstreamStreamInterrupted(String),

    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::InvalidPathParameter { .. } | GatewayError::MalformedBody(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::MissingSession => StatusCode::UNAUTHORIZED,
            GatewayError::UpstreamUnreachable(_) | GatewayError::UpstreamStreamInterrupted(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the response body and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound(_) => "route_not_found",
            GatewayError::MethodNotAllowed(_) => "method_not_allowed",
            GatewayError::InvalidPathParameter { .. } => "invalid_path_parameter",
            GatewayError::MalformedBody(_) => "malformed_body",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::MissingSession => "missing_session",
            GatewayError::UpstreamUnreachable(_) => "upstream_unreachable",
            GatewayError::UpstreamTimeout(_) => "upstream_timeout",
            GatewayError::UpstreamStreamInterrupted(_) => "upstream_stream_interrupted",
            GatewayError::Internal(_) => "internal",
        }
    }

    /// True for failures talking to the upstream (as opposed to caller errors).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            GatewayError::UpstreamUnreachable(_)
                | GatewayError::UpstreamTimeout(_)
                | GatewayError::UpstreamStreamInterrupted(_)
        )
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        let mut response = (status, body).into_response();

        if let GatewayError::MethodNotAllowed(methods) = &self {
            let allow = methods
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::MalformedBody("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::MissingSession.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GatewayError::UpstreamTimeout(Duration::from_secs(1)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::UpstreamUnreachable("refused".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_allow_header() {
        let response =
            GatewayError::MethodNotAllowed(vec![Method::GET, Method::PATCH]).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, PATCH");
    }
}
