//! Tagged response cache subsystem.
//!
//! # Data Flow
//! ```text
//! GET route with cache policy:
//!     key.rs (method + upstream path + normalized query [+ session])
//!     → store.rs get() → HIT: serve stored response
//!                      → MISS: upstream call → store.rs put(tags, ttl)
//!
//! Successful mutating route:
//!     → invalidation.rs fire(tags) → store.rs invalidate(tag) per tag
//!
//! Background:
//!     sweeper.rs → store.rs purge_expired() on an interval
//! ```
//!
//! # Design Decisions
//! - The cache is an injected service, created once at startup
//! - Only the cache synchronizes access to its state; callers never lock it
//! - Invalidation is synchronous and completes before the handler responds

pub mod invalidation;
pub mod key;
pub mod store;
pub mod sweeper;

pub use invalidation::InvalidationBus;
pub use key::{CacheKey, Tag};
pub use store::{CacheEntry, CacheStats, TaggedCache};
pub use sweeper::CacheSweeper;
