//! Admin API, served on its own listener.
//!
//! - `GET /admin/status`
//! - `GET /admin/routes`
//! - `GET /admin/cache`
//! - `POST /admin/cache/invalidate` with `{"tags": [...]}`

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route("/admin/cache", get(get_cache))
        .route("/admin/cache/invalidate", post(post_invalidate))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
