//! Write-triggered cache invalidation.

use std::sync::Arc;

use crate::cache::key::Tag;
use crate::cache::store::TaggedCache;
use crate::observability::metrics;

/// Purges cache entries by tag after a successful mutating request.
///
/// `fire` runs synchronously: when it returns, no later `get` can observe an
/// entry that carried one of the fired tags at the time of the call.
#[derive(Clone)]
pub struct InvalidationBus {
    cache: Arc<TaggedCache>,
}

impl InvalidationBus {
    pub fn new(cache: Arc<TaggedCache>) -> Self {
        Self { cache }
    }

    /// Invalidate every tag. Returns the number of entries removed.
    pub fn fire(&self, tags: &[Tag]) -> usize {
        let mut removed = 0;
        for tag in tags {
            let count = self.cache.invalidate(tag);
            tracing::debug!(tag = %tag, removed = count, "Tag invalidated");
            removed += count;
        }

        if !tags.is_empty() {
            metrics::record_invalidation(tags.len(), removed);
            tracing::info!(tags = ?tags, removed, "Cache invalidation fired");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::CacheKey;
    use axum::http::{HeaderMap, Method, StatusCode};
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::time::Duration;

    fn store(cache: &TaggedCache, path: &str, tag: &str) {
        cache.put(
            CacheKey::new(&Method::GET, path, None),
            Bytes::from_static(b"{}"),
            HeaderMap::new(),
            StatusCode::OK,
            HashSet::from([Tag::from(tag)]),
            Duration::from_secs(60),
        );
    }

    #[tokio::test]
    async fn test_fire_multiple_tags() {
        let cache = Arc::new(TaggedCache::new(100, 1024));
        store(&cache, "/departments", "admin:departments");
        store(&cache, "/departments/3", "admin:departments:detail:3");
        store(&cache, "/spaces", "student:spaces");

        let bus = InvalidationBus::new(Arc::clone(&cache));
        let removed = bus.fire(&[
            Tag::from("admin:departments"),
            Tag::from("admin:departments:detail:3"),
        ]);

        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_fire_without_matches_is_noop() {
        let cache = Arc::new(TaggedCache::new(100, 1024));
        store(&cache, "/spaces", "student:spaces");

        let bus = InvalidationBus::new(Arc::clone(&cache));
        assert_eq!(bus.fire(&[Tag::from("unknown")]), 0);
        assert_eq!(bus.fire(&[]), 0);
        assert_eq!(cache.len(), 1);
    }
}
