//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, TTLs > 0)
//! - Check route declarations compile and are mutually consistent
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;

use thiserror::Error;
use url::Url;

use crate::config::schema::{BodyMode, CacheMode, GatewayConfig, RouteConfig};
use crate::routing::spec::{is_mutating, parse_method, RouteSpec};
use crate::routing::matcher::PathPattern;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("upstream.base_url `{0}` is not an absolute http URL")]
    InvalidBaseUrl(String),

    #[error("upstream.api_prefix `{0}` must start with '/'")]
    InvalidApiPrefix(String),

    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),

    #[error(
        "listener.request_timeout_secs ({listener}) must exceed upstream.request_timeout_secs ({upstream})"
    )]
    ListenerTimeoutTooShort { listener: u64, upstream: u64 },

    #[error("session.cookie_name must not be empty")]
    EmptyCookieName,

    #[error("route name `{0}` is declared more than once")]
    DuplicateName(String),

    #[error("routes `{first}` and `{second}` both handle {method} {shape}")]
    DuplicateRoute {
        first: String,
        second: String,
        method: String,
        shape: String,
    },

    #[error("route `{route}`: {reason}")]
    Route { route: String, reason: String },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" && url.has_host() => {}
        _ => errors.push(ValidationError::InvalidBaseUrl(
            config.upstream.base_url.clone(),
        )),
    }
    if !config.upstream.api_prefix.is_empty() && !config.upstream.api_prefix.starts_with('/') {
        errors.push(ValidationError::InvalidApiPrefix(
            config.upstream.api_prefix.clone(),
        ));
    }

    let positives: [(&'static str, u64); 6] = [
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
        ("upstream.request_timeout_secs", config.upstream.request_timeout_secs),
        ("listener.request_timeout_secs", config.listener.request_timeout_secs),
        ("listener.max_in_flight", config.listener.max_in_flight as u64),
        ("cache.capacity", config.cache.capacity as u64),
        ("cache.sweep_interval_secs", config.cache.sweep_interval_secs),
    ];
    for (field, value) in positives {
        if value == 0 {
            errors.push(ValidationError::NonPositive(field));
        }
    }

    // The listener timeout answers 408 on its own; it must not pre-empt the upstream 504
    let (listener, upstream) = (
        config.listener.request_timeout_secs,
        config.upstream.request_timeout_secs,
    );
    if upstream > 0 && listener <= upstream {
        errors.push(ValidationError::ListenerTimeoutTooShort { listener, upstream });
    }

    if config.session.cookie_name.trim().is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }

    let mut names: HashMap<&str, usize> = HashMap::new();
    let mut shapes: HashMap<(String, String), &str> = HashMap::new();

    for route in &config.routes {
        *names.entry(route.name.as_str()).or_default() += 1;

        if let Ok(pattern) = PathPattern::parse(&route.path) {
            let key = (route.method.to_ascii_uppercase(), pattern.shape());
            if let Some(first) = shapes.get(&key) {
                errors.push(ValidationError::DuplicateRoute {
                    first: first.to_string(),
                    second: route.name.clone(),
                    method: key.0.clone(),
                    shape: key.1.clone(),
                });
            } else {
                shapes.insert(key, route.name.as_str());
            }
        }

        validate_route(route, &mut errors);
    }

    let mut duplicated: Vec<&str> = names
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name)
        .collect();
    duplicated.sort_unstable();
    errors.extend(
        duplicated
            .into_iter()
            .map(|name| ValidationError::DuplicateName(name.to_string())),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    let mut fail = |reason: String| {
        errors.push(ValidationError::Route {
            route: route.name.clone(),
            reason,
        })
    };

    if let Err(e) = RouteSpec::from_config(route) {
        fail(e.to_string());
        return;
    }

    // Method parsed successfully above
    let Some(method) = parse_method(&route.method) else {
        return;
    };
    let mutating = is_mutating(&method);

    if route.streaming && route.cache.is_some() {
        fail("streaming routes cannot be cached".to_string());
    }
    if route.streaming && route.body == BodyMode::Json {
        fail("streaming routes pipe the raw body; remove `body = \"json\"`".to_string());
    }
    if route.cache.is_some() && mutating {
        fail(format!("only GET routes can be cached, not {method}"));
    }
    if !route.invalidates.is_empty() && !mutating {
        fail("`invalidates` is only allowed on mutating methods".to_string());
    }
    if route.body == BodyMode::Json && !mutating {
        fail(format!("{method} routes do not carry a body"));
    }

    if let Some(cache) = &route.cache {
        if cache.tags.is_empty() {
            fail("cached routes must declare at least one tag".to_string());
        }
        let ttl = match cache.mode {
            CacheMode::Ttl => cache.ttl_secs,
            CacheMode::Dynamic => cache.max_ttl_secs,
        };
        if ttl == Some(0) {
            fail("cache TTL must be greater than zero".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CacheScope, RouteCacheConfig};

    fn route(name: &str, method: &str, path: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            method: method.into(),
            path: path.into(),
            upstream_path: path.into(),
            forward_query: false,
            body: BodyMode::None,
            auth: true,
            streaming: false,
            cache: None,
            invalidates: Vec::new(),
        }
    }

    fn cache(ttl: u64, tags: &[&str]) -> Option<RouteCacheConfig> {
        Some(RouteCacheConfig {
            mode: CacheMode::Ttl,
            ttl_secs: Some(ttl),
            max_ttl_secs: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            scope: CacheScope::Shared,
        })
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.upstream.base_url = "not a url".into();
        config.upstream.request_timeout_secs = 0;
        config.session.cookie_name = "".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidBaseUrl("not a url".into())));
        assert!(errors.contains(&ValidationError::NonPositive("upstream.request_timeout_secs")));
        assert!(errors.contains(&ValidationError::EmptyCookieName));
    }

    #[test]
    fn rejects_listener_timeout_not_above_upstream() {
        let mut config = GatewayConfig::default();
        config.upstream.request_timeout_secs = 30;
        config.listener.request_timeout_secs = 30;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::ListenerTimeoutTooShort {
                listener: 30,
                upstream: 30,
            }]
        );

        config.listener.request_timeout_secs = 31;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_https_upstream() {
        let mut config = GatewayConfig::default();
        config.upstream.base_url = "https://api.internal".into();
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidBaseUrl("https://api.internal".into())]
        );
    }

    #[test]
    fn rejects_duplicate_method_path() {
        let mut config = GatewayConfig::default();
        config.routes = vec![
            route("a", "GET", "/departments/{id}"),
            route("b", "get", "/departments/{dept}"),
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::DuplicateRoute { .. }));
    }

    #[test]
    fn keeps_distinct_upstreams_for_same_resource() {
        let mut config = GatewayConfig::default();
        let mut a = route("dept-detail", "GET", "/departments/{id}");
        a.upstream_path = "/departments/{id}".into();
        a.cache = cache(60, &["admin:departments"]);
        let mut b = route("dept-detail-admin", "GET", "/admin/departments/{id}");
        b.upstream_path = "/admin/departments/{id}/detail".into();
        config.routes = vec![a, b];

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut config = GatewayConfig::default();
        config.routes = vec![route("x", "GET", "/a"), route("x", "GET", "/b")];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateName("x".into())]);
    }

    #[test]
    fn rejects_streaming_cache() {
        let mut config = GatewayConfig::default();
        let mut upload = route("upload", "GET", "/files/{*path}");
        upload.streaming = true;
        upload.cache = cache(60, &["files"]);
        config.routes = vec![upload];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_cache_policy_misuse() {
        let mut config = GatewayConfig::default();
        let mut post = route("create", "POST", "/spaces");
        post.cache = cache(60, &["student:spaces"]);
        let mut get = route("list", "GET", "/spaces");
        get.invalidates = vec!["student:spaces".into()];
        let mut untagged = route("detail", "GET", "/spaces/{id}");
        untagged.cache = cache(60, &[]);
        let mut zero = route("other", "GET", "/other");
        zero.cache = cache(0, &["other"]);
        config.routes = vec![post, get, untagged, zero];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn rejects_json_body_on_get() {
        let mut config = GatewayConfig::default();
        let mut get = route("list", "GET", "/spaces");
        get.body = BodyMode::Json;
        config.routes = vec![get];
        assert!(validate_config(&config).is_err());
    }
}
