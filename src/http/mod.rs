//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, catch-all dispatch)
//!     → request.rs (request ID, peer address)
//!     → [route table lookup, gateway core]
//!     → response.rs (relay, cache hits, x-cache marking)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use response::{CacheStatus, X_CACHE};
pub use server::{AppState, GatewayServer, ServerError};
