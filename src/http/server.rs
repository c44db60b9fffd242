//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the gateway core (route table, cache, upstream client) from config
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (request ID, tracing, in-flight limit, timeout)
//! - Serve plain TCP or TLS with graceful shutdown
//! - Dispatch requests through the compiled route table

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{limit::GlobalConcurrencyLimitLayer, ServiceBuilder};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::cache::TaggedCache;
use crate::config::GatewayConfig;
use crate::gateway::{Gateway, GatewayError, RequestTranslator, UpstreamClient};
use crate::http::request::{self, request_id};
use crate::observability::metrics;
use crate::routing::{Lookup, RouteError, RouteTable};
use crate::security::SessionExtractor;

/// Drain budget for in-flight TLS connections after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Routes(#[from] RouteError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub gateway: Arc<Gateway>,
    pub started_at: Instant,
    pub admin_api_key: Arc<str>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    config: GatewayConfig,
    state: AppState,
}

impl GatewayServer {
    /// Build every subsystem from an already validated config.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let routes = Arc::new(RouteTable::compile(&config.routes)?);
        let cache = Arc::new(TaggedCache::new(
            config.cache.capacity,
            config.cache.max_entry_bytes,
        ));
        let client = UpstreamClient::new(&config.upstream);
        let translator = RequestTranslator::new(
            &config.upstream,
            SessionExtractor::new(&config.session),
            config.security.max_body_size,
        );

        let state = AppState {
            routes,
            gateway: Arc::new(Gateway::new(translator, client, cache)),
            started_at: Instant::now(),
            admin_api_key: Arc::from(config.admin.api_key.as_str()),
        };
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(request::set_request_id_layer())
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        path = %req.uri().path(),
                        request_id = %request_id(req.headers()),
                    )
                }),
            )
            .layer(request::propagate_request_id_layer())
            .layer(GlobalConcurrencyLimitLayer::new(self.config.listener.max_in_flight))
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.listener.request_timeout_secs,
            )));

        Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(self.state.clone())
            .layer(middleware)
    }

    /// Router for the admin listener.
    pub fn admin_router(&self) -> Router {
        crate::admin::admin_router(self.state.clone())
    }

    /// Serve on a bound TCP listener until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.state.routes.len(), "HTTP server starting");

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve TLS on `addr` until the shutdown signal fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, routes = self.state.routes.len(), "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Catch-all handler: route lookup, then the gateway core.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let peer = request::peer_addr(&request);

    let matched = match state.routes.lookup(&method, request.uri().path()) {
        Lookup::Matched(matched) => matched,
        Lookup::MethodNotAllowed(allowed) => {
            return reject(GatewayError::MethodNotAllowed(allowed), &method, start);
        }
        Lookup::NotFound => {
            let path = request.uri().path().to_string();
            tracing::debug!(path = %path, "No route matched");
            return reject(GatewayError::RouteNotFound(path), &method, start);
        }
    };

    let route = matched.route.name.clone();
    let response = match state.gateway.handle(matched, request, peer).await {
        Ok(response) => response,
        Err(e) => {
            if e.is_upstream() {
                tracing::warn!(route = %route, error = %e, "Upstream failure");
            } else {
                tracing::debug!(route = %route, error = %e, "Request rejected");
            }
            e.into_response()
        }
    };

    metrics::record_request(&route, method.as_str(), response.status().as_u16(), start);
    response
}

fn reject(error: GatewayError, method: &axum::http::Method, start: Instant) -> Response {
    let response = error.into_response();
    metrics::record_request("unmatched", method.as_str(), response.status().as_u16(), start);
    response
}
