//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request headers
//!     → session.rs (session cookie → Authorization)
//!     → headers.rs (allowlist; everything else dropped)
//!     → forwarded to upstream
//!
//! Upstream response headers
//!     → headers.rs (strip hop-by-hop; strip Set-Cookie before caching)
//! ```
//!
//! # Design Decisions
//! - Explicit allowlist instead of pass-everything forwarding
//! - Raw Cookie header never leaves the gateway
//! - Absent session on a protected route is a 401, not a gateway fault

pub mod headers;
pub mod session;

pub use session::SessionExtractor;
