//! Backend-for-frontend gateway library.
//!
//! Forwards browser calls to a single upstream API, caches GET responses
//! under invalidation tags and purges them after successful writes.

pub mod admin;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use gateway::{Gateway, GatewayError};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
