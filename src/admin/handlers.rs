use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheStats, Tag};
use crate::gateway::GatewayError;
use crate::http::server::AppState;
use crate::routing::spec::RouteSummary;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub routes: usize,
    pub cache_entries: usize,
}

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvalidateResponse {
    pub tags: usize,
    pub removed: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        routes: state.routes.len(),
        cache_entries: state.gateway.cache().len(),
    })
}

pub async fn get_routes(State(state): State<AppState>) -> Json<Vec<RouteSummary>> {
    Json(state.routes.routes().iter().map(|r| r.summary()).collect())
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.gateway.cache().stats())
}

/// Manual purge, same path as a successful write.
pub async fn post_invalidate(
    State(state): State<AppState>,
    Json(request): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>, GatewayError> {
    if request.tags.is_empty() {
        return Err(GatewayError::MalformedBody("`tags` must not be empty".to_string()));
    }

    tracing::info!(tags = ?request.tags, "Manual cache invalidation requested");
    let removed = state.gateway.bus().fire(&request.tags);
    Ok(Json(InvalidateResponse {
        tags: request.tags.len(),
        removed,
    }))
}
