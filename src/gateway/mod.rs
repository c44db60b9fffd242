//! Gateway core subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request + matched RouteSpec
//!     → translator.rs (path params, query, body, header allowlist)
//!     → policy.rs (cache key, force-fresh, storage TTL)
//!     → cache lookup (cacheable GET only)
//!     → client.rs (single upstream attempt, deadline)
//!     → stream.rs (piped bodies) or buffered relay
//!     → invalidation bus on 2xx writes
//!     → response / error.rs
//! ```
//!
//! # Design Decisions
//! - The cache and bus are injected at construction, never global
//! - Upstream 4xx/5xx are relayed verbatim and are not errors here
//! - Every failure is converted to a JSON error response at the handler

pub mod client;
pub mod error;
pub mod handler;
pub mod policy;
pub mod stream;
pub mod translator;

pub use client::{BufferedResponse, UpstreamClient, UpstreamResponse};
pub use error::GatewayError;
pub use handler::Gateway;
pub use translator::{ForwardBody, ForwardedRequest, RequestTranslator, Translated};
