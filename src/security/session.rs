//! Session cookie propagation.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::schema::SessionConfig;

/// Turns the inbound session cookie into an upstream `Authorization` header.
#[derive(Debug, Clone)]
pub struct SessionExtractor {
    cookie_name: String,
    scheme: String,
}

impl SessionExtractor {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            scheme: config.auth_scheme.clone(),
        }
    }

    /// Value of the session cookie, if present and non-empty.
    pub fn cookie_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.trim_matches('"'))
            .filter(|value| !value.is_empty())
    }

    /// Authorization to send upstream: an explicit inbound header wins,
    /// otherwise one is derived from the session cookie.
    pub fn authorization(&self, headers: &HeaderMap) -> Option<HeaderValue> {
        if let Some(existing) = headers.get(header::AUTHORIZATION) {
            return Some(existing.clone());
        }
        let token = self.cookie_token(headers)?;
        let mut value = HeaderValue::from_str(&format!("{} {}", self.scheme, token)).ok()?;
        value.set_sensitive(true);
        Some(value)
    }
}
