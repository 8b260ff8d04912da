//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: probes, then the gateway fallback
//! - Wire up middleware (access log, request ID)
//! - Serve connections with a header read timeout and a connection cap
//! - Drain in-flight connections on shutdown
//!
//! # Request pipeline
//! ```text
//! /healthz, /readyz → probe handlers
//! anything else     → access_log → match decoded path → auth → normalize path
//!                   → request preview (opt-in) → dispatch to upstream
//! ```

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{uri::PathAndQuery, Request, Uri},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto,
    service::TowerToHyperService,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::{AuthDefaults, GatewayConfig};
use crate::health;
use crate::http::request::MakeRequestUuidV4;
use crate::http::response::GatewayError;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::capture::{capture_request, PreviewMode};
use crate::observability::{access_log, metrics, MatchedRoute};
use crate::routing::{decode_path, Route, RouteTable, RouteTableError};
use crate::security;
use crate::upstream::Dispatcher;

/// How long shutdown waits for open connections to finish.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Why the server could not be assembled from a configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Routes(#[from] RouteTableError),

    #[error("configure upstream TLS: {0}")]
    Tls(#[from] rustls::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub auth: AuthDefaults,
    pub dispatcher: Dispatcher,
    pub previews: PreviewMode,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    name: String,
    max_connections: usize,
    header_read_timeout: Duration,
    drain_timeout: Duration,
}

impl HttpServer {
    /// Build the server from a validated configuration.
    pub fn new(config: &GatewayConfig, previews: PreviewMode) -> Result<Self, BuildError> {
        let routes = RouteTable::build(&config.routes, &config.servers)?;
        let state = AppState {
            routes: Arc::new(routes),
            auth: config.auth,
            dispatcher: Dispatcher::new(previews)?,
            previews,
        };

        let settings = &config.gateway;
        Ok(Self {
            router: build_router(state),
            name: settings.name.clone(),
            max_connections: settings.max_connections,
            header_read_timeout: Duration::from_millis(settings.header_read_timeout_ms),
            drain_timeout: DRAIN_TIMEOUT,
        })
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// The complete request pipeline as a tower service.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let listener = Listener::from_tcp(listener, self.max_connections)?;
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(gateway = %self.name, address = %addr, "Gateway listening");

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.header_read_timeout);

        let tracker = ConnectionTracker::new();

        loop {
            let (stream, peer, permit) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                _ = shutdown.recv() => break,
            };

            let service = TowerToHyperService::new(self.router.clone().map_request(
                move |mut request: Request<Incoming>| {
                    request.extensions_mut().insert(ConnectInfo(peer));
                    request
                },
            ));
            let builder = builder.clone();
            let mut conn_shutdown = shutdown.resubscribe();
            let guard = tracker.track();

            tokio::spawn(async move {
                let _permit = permit;
                metrics::connection_opened();

                let conn = builder.serve_connection(TokioIo::new(stream), service);
                tokio::pin!(conn);

                let mut draining = false;
                loop {
                    tokio::select! {
                        result = conn.as_mut() => {
                            if let Err(e) = result {
                                tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection error");
                            }
                            break;
                        }
                        _ = conn_shutdown.recv(), if !draining => {
                            draining = true;
                            conn.as_mut().graceful_shutdown();
                        }
                    }
                }

                metrics::connection_closed();
                drop(guard);
            });
        }

        drop(listener);
        tracing::info!(
            active_connections = tracker.active_count(),
            "Stopped accepting, draining connections"
        );
        if !tracker.wait_for_drain(self.drain_timeout).await {
            tracing::warn!(
                remaining = tracker.active_count(),
                "Drain deadline passed with connections still open"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Probes are answered first; everything else reaches the gateway
/// pipeline behind the access log.
fn build_router(state: AppState) -> Router {
    let gateway = Router::new()
        .fallback(gateway_handler)
        .with_state(state)
        .layer(middleware::from_fn(access_log));

    health::probes()
        .fallback_service(gateway)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
}

async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let path = decode_path(request.uri().path()).into_owned();
    let Some(route) = state.routes.match_path(&path) else {
        tracing::debug!(path = %path, "No route matched");
        return GatewayError::NoRoute.into_response();
    };

    let mut response = match proxy(&state, route, &path, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    response
        .extensions_mut()
        .insert(MatchedRoute(route.name().to_string()));
    response
}

async fn proxy(
    state: &AppState,
    route: &Route,
    path: &str,
    mut request: Request<Body>,
) -> Result<Response, GatewayError> {
    if let Err(e) = security::enforce(route.auth(), &state.auth, request.headers()) {
        tracing::debug!(route = route.name(), reason = %e, "Request denied");
        return Err(e.into());
    }

    if let Cow::Owned(normalized) = route.matcher().normalize(path) {
        replace_path(&mut request, &normalized);
    }

    if let PreviewMode::Enabled { limit } = state.previews {
        let (parts, body) = request.into_parts();
        let captured = capture_request(body, limit).await;
        if let Some(failure) = &captured.failure {
            tracing::warn!(route = route.name(), error = %failure, "Failed to read request body for preview");
        }

        if !captured.preview.text.is_empty() {
            tracing::info!(
                route = route.name(),
                path = %parts.uri.path(),
                body = %captured.preview.text,
                truncated = captured.preview.truncated,
                "mcp_request"
            );
        }
        request = Request::from_parts(parts, captured.body);
    }

    state.dispatcher.dispatch(route, request).await
}

/// Swap the request path, keeping the query string.
fn replace_path(request: &mut Request<Body>, path: &str) {
    let path_and_query = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let Ok(path_and_query) = PathAndQuery::try_from(path_and_query) else {
        return;
    };

    let mut parts = request.uri().clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    if let Ok(uri) = Uri::from_parts(parts) {
        *request.uri_mut() = uri;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, ConfigFormat, RouteAuth, RouteConfig, ServerConfig, Transport};
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use bytes::Bytes;
    use http_body::Frame;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::AsyncReadExt;

    const CONFIG: &str = r#"
apiVersion: mcp.envoy.io/v1alpha1
kind: GatewayConfig
gateway:
  name: test
  listenAddr: "127.0.0.1:0"
servers:
  - name: fs
    transport: stdio
    command: npx
routes:
  - name: filesystem
    path: /mcp/fs
    server: fs
"#;

    fn server(require_auth: bool) -> HttpServer {
        let mut config = parse_config(CONFIG, ConfigFormat::Yaml).unwrap();
        config.auth.require_auth = require_auth;
        HttpServer::new(&config, PreviewMode::Disabled).unwrap()
    }

    async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn probes_answer_any_method_without_auth() {
        let router = server(true).router();
        assert_eq!(send(router.clone(), "GET", "/healthz").await, (StatusCode::OK, "ok".into()));
        assert_eq!(send(router.clone(), "POST", "/healthz").await, (StatusCode::OK, "ok".into()));
        assert_eq!(send(router, "DELETE", "/readyz").await, (StatusCode::OK, "ready".into()));
    }

    #[tokio::test]
    async fn unmatched_path_is_404_before_auth() {
        let (status, body) = send(server(true).router(), "GET", "/other").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "404 page not found");
    }

    #[tokio::test]
    async fn auth_runs_before_transport_dispatch() {
        let (status, body) = send(server(true).router(), "POST", "/mcp/fs").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "missing API key");
    }

    #[tokio::test]
    async fn stdio_route_is_not_implemented() {
        let (status, body) = send(server(false).router(), "POST", "/mcp/fs/").await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["route"], "filesystem");
        assert_eq!(json["server"], "fs");
        assert_eq!(json["transport"], "stdio");
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let request = Request::builder().uri("/nowhere").body(Body::empty()).unwrap();
        let response = server(false).router().oneshot(request).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));

        let request = Request::builder()
            .uri("/healthz")
            .header("x-request-id", "client-chosen")
            .body(Body::empty())
            .unwrap();
        let response = server(false).router().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "client-chosen");
    }

    #[tokio::test]
    async fn route_override_beats_defaults() {
        let mut config = parse_config(CONFIG, ConfigFormat::Yaml).unwrap();
        config.auth.require_auth = true;
        config.servers.push(ServerConfig {
            name: "local".into(),
            transport: Transport::Stdio { command: "echo".into(), args: vec![] },
        });
        config.routes.push(RouteConfig {
            auth: Some(RouteAuth { kind: "none".into(), ..Default::default() }),
            ..RouteConfig::new("open", "/open", "local")
        });
        let router = HttpServer::new(&config, PreviewMode::Disabled).unwrap().router();

        let (status, _) = send(router, "GET", "/open").await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn trailing_slash_is_replaced_keeping_query() {
        let mut request = Request::builder().uri("/mcp/fs/?session=1").body(Body::empty()).unwrap();
        replace_path(&mut request, "/mcp/fs");
        assert_eq!(request.uri(), "/mcp/fs?session=1");
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(
            server(false)
                .with_drain_timeout(Duration::from_secs(1))
                .run(listener, rx),
        );

        let body = reqwest::get(format!("http://{addr}/healthz"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    /// Client body that delivers one chunk and then breaks.
    struct BrokenBody(Option<Bytes>);

    impl http_body::Body for BrokenBody {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, std::io::Error>>> {
            match self.0.take() {
                Some(chunk) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
                None => Poll::Ready(Some(Err(std::io::Error::other("client went away")))),
            }
        }
    }

    /// Upstream that accepts connections and reads forever without answering.
    async fn silent_upstream() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
                });
            }
        });
        addr
    }

    fn http_server(upstream: std::net::SocketAddr, previews: PreviewMode) -> HttpServer {
        let yaml = format!(
            r#"
apiVersion: mcp.envoy.io/v1alpha1
kind: GatewayConfig
gateway:
  name: test
  listenAddr: "127.0.0.1:0"
servers:
  - name: remote
    transport: http
    url: http://{upstream}
routes:
  - name: remote
    path: /mcp
    server: remote
"#
        );
        let config = parse_config(&yaml, ConfigFormat::Yaml).unwrap();
        HttpServer::new(&config, previews).unwrap()
    }

    #[test]
    fn tls_upstreams_build_with_linked_providers() {
        let yaml = CONFIG.replace(
            "transport: stdio\n    command: npx",
            "transport: http\n    url: https://mcp.example.com/v1",
        );
        assert_ne!(yaml, CONFIG);
        let config = parse_config(&yaml, ConfigFormat::Yaml).unwrap();
        assert!(HttpServer::new(&config, PreviewMode::from_flag(true)).is_ok());
    }

    #[tokio::test]
    async fn broken_request_body_fails_the_same_with_previews_on() {
        let upstream = silent_upstream().await;

        for previews in [PreviewMode::Disabled, PreviewMode::from_flag(true)] {
            let request = Request::builder()
                .method("POST")
                .uri("/mcp")
                .body(Body::new(BrokenBody(Some(Bytes::from_static(b"{\"jsonrpc\"")))))
                .unwrap();
            let response = tokio::time::timeout(
                Duration::from_secs(5),
                http_server(upstream, previews).router().oneshot(request),
            )
            .await
            .unwrap()
            .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_GATEWAY, "previews: {previews:?}");
        }
    }

    #[tokio::test]
    async fn escaped_path_matches_decoded_route() {
        let (status, body) = send(server(true).router(), "POST", "/mcp/%66s").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "missing API key");

        let (status, _) = send(server(false).router(), "POST", "/mcp/%66s/").await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }
}
