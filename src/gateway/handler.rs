//! Per-request composition of translator, client, cache and bus.
//!
//! ```text
//! RECEIVED → TRANSLATED ─┬─ cacheable GET ── hit ─────────────────────────→ RESPONDED
//!                        │                  └ miss → UPSTREAM → store ─────→ RESPONDED
//!                        ├─ streaming ─────────────→ UPSTREAM → [fire] ────→ RESPONDED (piped)
//!                        └─ other ─────────────────→ UPSTREAM → [fire] ────→ RESPONDED
//!                                                       └ failure ────────→ RESPONDED_WITH_ERROR
//! ```
//!
//! Invalidation fires only on a 2xx upstream status, as soon as the response
//! head arrives and before the response is returned.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    response::Response,
};

use crate::cache::{InvalidationBus, Tag, TaggedCache};
use crate::gateway::client::UpstreamClient;
use crate::gateway::error::GatewayError;
use crate::gateway::policy;
use crate::gateway::stream;
use crate::gateway::translator::{RequestTranslator, Translated};
use crate::http::response::{self, CacheStatus};
use crate::observability::metrics;
use crate::routing::{RouteMatch, RouteSpec};
use crate::security::headers::cacheable_headers;

/// The gateway core shared by every request task.
pub struct Gateway {
    translator: RequestTranslator,
    client: UpstreamClient,
    cache: Arc<TaggedCache>,
    bus: InvalidationBus,
}

impl Gateway {
    pub fn new(translator: RequestTranslator, client: UpstreamClient, cache: Arc<TaggedCache>) -> Self {
        let bus = InvalidationBus::new(Arc::clone(&cache));
        Self {
            translator,
            client,
            cache,
            bus,
        }
    }

    pub fn cache(&self) -> &Arc<TaggedCache> {
        &self.cache
    }

    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    /// Serve one matched request.
    pub async fn handle(
        &self,
        matched: RouteMatch,
        request: Request<Body>,
        peer: Option<SocketAddr>,
    ) -> Result<Response, GatewayError> {
        let route = Arc::clone(&matched.route);
        let (parts, body) = request.into_parts();
        let translated = self.translator.translate(&matched, &parts, body, peer).await?;

        if route.streaming {
            self.stream(&route, translated).await
        } else if route.cache.is_cacheable() {
            self.cached(&route, &parts.headers, translated).await
        } else {
            self.forward(&route, translated).await
        }
    }

    async fn cached(
        &self,
        route: &RouteSpec,
        inbound: &HeaderMap,
        translated: Translated,
    ) -> Result<Response, GatewayError> {
        let Some(key) = policy::cache_key(&route.cache, &translated) else {
            metrics::record_cache_lookup(&route.name, "bypass");
            let response = self.forward(route, translated).await?;
            return Ok(response::with_cache_status(response, CacheStatus::Bypass));
        };

        let outcome = if policy::wants_fresh(inbound) {
            CacheStatus::Bypass
        } else if let Some(entry) = self.cache.get(&key) {
            metrics::record_cache_lookup(&route.name, "hit");
            tracing::debug!(route = %route.name, cache_key = %key, "Cache hit");
            return Ok(response::from_cache(&entry));
        } else {
            CacheStatus::Miss
        };
        metrics::record_cache_lookup(&route.name, if outcome == CacheStatus::Miss { "miss" } else { "bypass" });

        let tags: HashSet<Tag> = translated
            .params
            .render_tags(route.cache.tags())?
            .into_iter()
            .collect();
        let upstream = self.client.send(translated.request).await?.read_body().await?;

        if upstream.status.is_success() {
            if let Some(ttl) = policy::storage_ttl(&route.cache, &upstream.headers) {
                let stored = self.cache.put(
                    key.clone(),
                    upstream.body.clone(),
                    cacheable_headers(&upstream.headers),
                    upstream.status,
                    tags,
                    ttl,
                );
                if stored {
                    tracing::debug!(route = %route.name, cache_key = %key, ttl = ?ttl, "Response cached");
                }
            }
        }

        Ok(response::with_cache_status(response::from_upstream(upstream), outcome))
    }

    async fn forward(&self, route: &RouteSpec, translated: Translated) -> Result<Response, GatewayError> {
        let tags = translated.params.render_tags(&route.invalidates)?;
        let upstream = self.client.send(translated.request).await?;

        // A 2xx head means the write was accepted, even if the body is lost
        if upstream.status.is_success() {
            self.bus.fire(&tags);
        } else if !tags.is_empty() {
            tracing::debug!(
                route = %route.name,
                status = %upstream.status,
                "Upstream write failed, cache left intact"
            );
        }
        Ok(response::from_upstream(upstream.read_body().await?))
    }

    async fn stream(&self, route: &RouteSpec, translated: Translated) -> Result<Response, GatewayError> {
        let tags = translated.params.render_tags(&route.invalidates)?;
        let upstream = self.client.send(translated.request).await?;

        if upstream.status.is_success() {
            self.bus.fire(&tags);
        }
        Ok(stream::relay(&route.name, upstream))
    }
}
