//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate path pattern, capture params)
//!     → Return: matched RouteSpec + params, MethodNotAllowed, or NotFound
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → spec.rs (compile patterns, templates, cache policy)
//!     → Reject duplicate (method, shape) pairs
//!     → Sort by specificity
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - Duplicate upstream mappings for the same resource stay distinct routes

pub mod matcher;
pub mod router;
pub mod spec;

pub use router::{Lookup, RouteMatch, RouteTable};
pub use spec::{CachePolicy, RouteError, RouteSpec};
