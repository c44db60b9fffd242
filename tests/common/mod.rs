//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    Router,
};
use bff_gateway::config::schema::{BodyMode, CacheMode, CacheScope, RouteCacheConfig};
use bff_gateway::config::validation::validate_config;
use bff_gateway::config::{GatewayConfig, RouteConfig};
use bff_gateway::http::AppState;
use bff_gateway::{GatewayServer, Shutdown};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Every request the mock upstream received, in arrival order.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Recorded>>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    pub fn last(&self) -> Option<Recorded> {
        self.calls.lock().unwrap().last().cloned()
    }
}

async fn record(State(recorder): State<Recorder>, request: Request<Body>, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, 64 * 1024 * 1024).await.unwrap_or_default();
    recorder.calls.lock().unwrap().push(Recorded {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers.clone(),
        body: body.clone(),
    });
    next.run(Request::from_parts(parts, Body::from(body))).await
}

/// Serve `app` as the upstream on an ephemeral port, recording every call.
pub async fn start_upstream(app: Router) -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let app = app.layer(middleware::from_fn_with_state(recorder.clone(), record));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, recorder)
}

/// Upstream that accepts connections and never answers.
pub async fn start_silent_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Upstream that promises `declared` bytes, sends `sent`, then closes.
pub async fn start_truncating_upstream(declared: usize, sent: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {declared}\r\n\r\n"
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&vec![b'x'; sent]).await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                // Dropping the socket ends the body early
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// A running gateway.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn config_for(upstream: SocketAddr, routes: Vec<RouteConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = format!("http://{upstream}");
    config.upstream.api_prefix = "/api/v1".into();
    config.routes = routes;
    config
}

pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let (gateway, _) = spawn(config, false).await;
    gateway
}

/// Gateway plus its admin API on a second ephemeral port.
pub async fn spawn_gateway_with_admin(config: GatewayConfig) -> (TestGateway, SocketAddr) {
    let (gateway, admin) = spawn(config, true).await;
    (gateway, admin.unwrap())
}

async fn spawn(config: GatewayConfig, with_admin: bool) -> (TestGateway, Option<SocketAddr>) {
    validate_config(&config).expect("test config must be valid");

    let server = GatewayServer::new(config).unwrap();
    let state = server.state().clone();
    let shutdown = Shutdown::new();

    let admin = if with_admin {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = server.admin_router();
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
        });
        Some(addr)
    } else {
        None
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    (
        TestGateway {
            addr,
            state,
            shutdown,
        },
        admin,
    )
}

/// Send a GET with `target` written to the wire as-is and return the status.
pub async fn raw_get(addr: SocketAddr, target: &str) -> StatusCode {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let head = String::from_utf8_lossy(&response);
    let code = head.split_whitespace().nth(1).unwrap();
    StatusCode::from_u16(code.parse().unwrap()).unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub fn route(name: &str, method: &str, path: &str, upstream_path: &str) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        method: method.into(),
        path: path.into(),
        upstream_path: upstream_path.into(),
        forward_query: false,
        body: BodyMode::None,
        auth: false,
        streaming: false,
        cache: None,
        invalidates: Vec::new(),
    }
}

pub fn cached(mut route: RouteConfig, ttl_secs: u64, tags: &[&str]) -> RouteConfig {
    route.cache = Some(RouteCacheConfig {
        mode: CacheMode::Ttl,
        ttl_secs: Some(ttl_secs),
        max_ttl_secs: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        scope: CacheScope::Shared,
    });
    route
}

pub fn writes(mut route: RouteConfig, invalidates: &[&str]) -> RouteConfig {
    route.body = BodyMode::Json;
    route.invalidates = invalidates.iter().map(|t| t.to_string()).collect();
    route
}
