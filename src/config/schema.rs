//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Upstream API server settings.
    pub upstream: UpstreamConfig,

    /// Session cookie propagation.
    pub session: SessionConfig,

    /// Tagged response cache settings.
    pub cache: CacheConfig,

    /// Security limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Route declarations, compiled into the route table at startup.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum requests handled concurrently (backpressure).
    pub max_in_flight: usize,

    /// Whole-request deadline for inbound calls, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_in_flight: 10_000,
            request_timeout_secs: 60,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Upstream API server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Absolute base URL (e.g., "http://127.0.0.1:8000").
    pub base_url: String,

    /// API version prefix every upstream path is rooted at.
    pub api_prefix: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Upstream request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle pooled connections per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
        }
    }
}

/// Session cookie propagation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the inbound cookie carrying the bearer token.
    pub cookie_name: String,

    /// Scheme used when the cookie is turned into an Authorization header.
    pub auth_scheme: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "access_token".to_string(),
            auth_scheme: "Bearer".to_string(),
        }
    }
}

/// Tagged response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction.
    pub capacity: usize,

    /// Responses larger than this are served but never stored.
    pub max_entry_bytes: usize,

    /// Interval of the background expiry sweep, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            max_entry_bytes: 1024 * 1024, // 1MB
            sweep_interval_secs: 30,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes for buffered (non-streaming) routes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// How a route's request body is handled.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyMode {
    /// No body is forwarded.
    #[default]
    None,
    /// Inbound JSON or form body, re-serialized as JSON.
    Json,
}

/// Whether cached entries are shared or keyed per session.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    #[default]
    Shared,
    Session,
}

/// Where a cached route takes its TTL from.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Fixed `ttl_secs`.
    #[default]
    Ttl,
    /// Upstream `Cache-Control` max-age, capped at `max_ttl_secs`.
    Dynamic,
}

/// Cache declaration on a GET route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteCacheConfig {
    #[serde(default)]
    pub mode: CacheMode,

    /// TTL for `mode = "ttl"`.
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Upper bound for `mode = "dynamic"`.
    #[serde(default)]
    pub max_ttl_secs: Option<u64>,

    /// Tag templates, e.g. "student:spaces:detail:{id}".
    pub tags: Vec<String>,

    #[serde(default)]
    pub scope: CacheScope,
}

/// A gateway endpoint declaration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE).
    pub method: String,

    /// Inbound path pattern, e.g. "/spaces/{id}".
    pub path: String,

    /// Upstream path template, rooted under the API prefix.
    pub upstream_path: String,

    /// Append the inbound query string verbatim.
    #[serde(default)]
    pub forward_query: bool,

    #[serde(default)]
    pub body: BodyMode,

    /// Require the session cookie (or an Authorization header).
    #[serde(default = "default_auth")]
    pub auth: bool,

    /// Pipe bodies without buffering. Never cached.
    #[serde(default)]
    pub streaming: bool,

    #[serde(default)]
    pub cache: Option<RouteCacheConfig>,

    /// Tag templates purged after a successful mutating call.
    #[serde(default)]
    pub invalidates: Vec<String>,
}

fn default_auth() -> bool {
    true
}
