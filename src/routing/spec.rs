//! Compiled, immutable route declarations.

use std::time::Duration;

use axum::http::Method;
use serde::Serialize;
use thiserror::Error;

use crate::config::schema::{BodyMode, CacheMode, CacheScope, RouteConfig};
use crate::routing::matcher::{PathPattern, PatternError, Template};

/// Errors compiling a route declaration.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route `{route}`: {source}")]
    Pattern {
        route: String,
        #[source]
        source: PatternError,
    },

    #[error("route `{route}`: unsupported method `{method}`")]
    Method { route: String, method: String },

    #[error("route `{route}`: {reason}")]
    Invalid { route: String, reason: String },

    #[error("routes `{first}` and `{second}` both handle {method} {shape}")]
    Duplicate {
        first: String,
        second: String,
        method: Method,
        shape: String,
    },
}

/// How a GET route's responses are cached.
#[derive(Debug, Clone)]
pub enum CachePolicy {
    /// Never cached.
    None,
    /// Cached for a fixed TTL.
    Ttl {
        ttl: Duration,
        tags: Vec<Template>,
        scope: CacheScope,
    },
    /// TTL read from the upstream response's `Cache-Control`, capped.
    Dynamic {
        max_ttl: Duration,
        tags: Vec<Template>,
        scope: CacheScope,
    },
}

impl CachePolicy {
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, CachePolicy::None)
    }

    pub fn tags(&self) -> &[Template] {
        match self {
            CachePolicy::None => &[],
            CachePolicy::Ttl { tags, .. } | CachePolicy::Dynamic { tags, .. } => tags,
        }
    }

    pub fn scope(&self) -> CacheScope {
        match self {
            CachePolicy::None => CacheScope::Shared,
            CachePolicy::Ttl { scope, .. } | CachePolicy::Dynamic { scope, .. } => *scope,
        }
    }
}

/// A gateway endpoint: upstream mapping plus cache and invalidation behavior.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub name: String,
    pub method: Method,
    pub pattern: PathPattern,
    pub upstream: Template,
    pub forward_query: bool,
    pub body: BodyMode,
    pub auth: bool,
    pub streaming: bool,
    pub cache: CachePolicy,
    pub invalidates: Vec<Template>,
}

impl RouteSpec {
    /// Compile a route declaration.
    pub fn from_config(config: &RouteConfig) -> Result<Self, RouteError> {
        let route = config.name.clone();
        let pattern_err = |source| RouteError::Pattern {
            route: route.clone(),
            source,
        };
        let invalid = |reason: String| RouteError::Invalid {
            route: route.clone(),
            reason,
        };

        let method = parse_method(&config.method).ok_or_else(|| RouteError::Method {
            route: route.clone(),
            method: config.method.clone(),
        })?;
        let pattern = PathPattern::parse(&config.path).map_err(pattern_err)?;
        let upstream = Template::parse(&config.upstream_path).map_err(pattern_err)?;
        if !config.upstream_path.starts_with('/') {
            return Err(invalid(format!(
                "upstream_path `{}` must start with '/'",
                config.upstream_path
            )));
        }

        let cache = match &config.cache {
            None => CachePolicy::None,
            Some(cache) => {
                let tags = cache
                    .tags
                    .iter()
                    .map(|t| Template::parse(t))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(pattern_err)?;
                match cache.mode {
                    CacheMode::Ttl => CachePolicy::Ttl {
                        ttl: Duration::from_secs(cache.ttl_secs.ok_or_else(|| {
                            invalid("cache mode `ttl` requires ttl_secs".to_string())
                        })?),
                        tags,
                        scope: cache.scope,
                    },
                    CacheMode::Dynamic => CachePolicy::Dynamic {
                        max_ttl: Duration::from_secs(cache.max_ttl_secs.ok_or_else(|| {
                            invalid("cache mode `dynamic` requires max_ttl_secs".to_string())
                        })?),
                        tags,
                        scope: cache.scope,
                    },
                }
            }
        };

        let invalidates = config
            .invalidates
            .iter()
            .map(|t| Template::parse(t))
            .collect::<Result<Vec<_>, _>>()
            .map_err(pattern_err)?;

        for template in std::iter::once(&upstream)
            .chain(cache.tags())
            .chain(invalidates.iter())
        {
            for param in template.params() {
                if !pattern.params().any(|p| p == param) {
                    return Err(invalid(format!(
                        "`{}` references undeclared parameter `{}`",
                        template.as_str(),
                        param
                    )));
                }
            }
        }

        Ok(Self {
            name: config.name.clone(),
            method,
            pattern,
            upstream,
            forward_query: config.forward_query,
            body: config.body,
            auth: config.auth,
            streaming: config.streaming,
            cache,
            invalidates,
        })
    }

    pub fn is_mutating(&self) -> bool {
        is_mutating(&self.method)
    }

    /// Serializable view for the admin API.
    pub fn summary(&self) -> RouteSummary {
        let (ttl_secs, dynamic) = match &self.cache {
            CachePolicy::None => (None, false),
            CachePolicy::Ttl { ttl, .. } => (Some(ttl.as_secs()), false),
            CachePolicy::Dynamic { max_ttl, .. } => (Some(max_ttl.as_secs()), true),
        };
        RouteSummary {
            name: self.name.clone(),
            method: self.method.to_string(),
            path: self.pattern.as_str().to_string(),
            upstream_path: self.upstream.as_str().to_string(),
            forward_query: self.forward_query,
            streaming: self.streaming,
            auth: self.auth,
            cache_ttl_secs: ttl_secs,
            cache_dynamic: dynamic,
            cache_tags: self.cache.tags().iter().map(|t| t.as_str().to_string()).collect(),
            invalidates: self.invalidates.iter().map(|t| t.as_str().to_string()).collect(),
        }
    }
}

/// Route description returned by `GET /admin/routes`.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub name: String,
    pub method: String,
    pub path: String,
    pub upstream_path: String,
    pub forward_query: bool,
    pub streaming: bool,
    pub auth: bool,
    pub cache_ttl_secs: Option<u64>,
    pub cache_dynamic: bool,
    pub cache_tags: Vec<String>,
    pub invalidates: Vec<String>,
}

/// Parse one of the methods the gateway supports.
pub fn parse_method(raw: &str) -> Option<Method> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        _ => None,
    }
}

pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
