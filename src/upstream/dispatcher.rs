//! Transport-keyed dispatch of authorized requests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::Request;
use axum::response::Response;

use crate::http::response::GatewayError;
use crate::observability::capture::{CaptureBody, Preview, PreviewMode};
use crate::routing::Route;
use crate::upstream::{HttpForwarder, Upstream};

/// What the gateway reports about a proxied response once its body is done.
#[derive(Debug, Clone)]
pub struct ResponseSummary {
    pub route: String,
    pub status: u16,
    pub content_type: String,
    pub preview: Preview,
}

type ResponseObserver = Arc<dyn Fn(ResponseSummary) + Send + Sync>;

/// Forwards requests to the upstream of their matched route.
#[derive(Clone)]
pub struct Dispatcher {
    http: HttpForwarder,
    previews: PreviewMode,
    on_response: ResponseObserver,
}

impl Dispatcher {
    pub fn new(previews: PreviewMode) -> Result<Self, rustls::Error> {
        Ok(Self {
            http: HttpForwarder::new()?,
            previews,
            on_response: Arc::new(log_response),
        })
    }

    #[cfg(test)]
    fn with_response_observer(mut self, observer: ResponseObserver) -> Self {
        self.on_response = observer;
        self
    }

    pub async fn dispatch(&self, route: &Route, request: Request<Body>) -> Result<Response, GatewayError> {
        match route.upstream() {
            Upstream::Http(target) => {
                let response = self.http.forward(target, request).await.map_err(|e| {
                    tracing::warn!(route = route.name(), server = route.server_name(), error = %e, "Upstream request failed");
                    GatewayError::Upstream(e.to_string())
                })?;
                Ok(self.stream_back(route, response))
            }
            Upstream::Stdio { command, .. } => {
                tracing::debug!(route = route.name(), command = %command, "stdio transport requested");
                Err(GatewayError::TransportNotImplemented {
                    route: route.name().to_string(),
                    server: route.server_name().to_string(),
                    transport: route.upstream().transport(),
                })
            }
        }
    }

    /// Hand the upstream response to axum, wrapping the body when previews are on.
    fn stream_back(&self, route: &Route, response: Response<hyper::body::Incoming>) -> Response {
        let (parts, body) = response.into_parts();
        let body = match self.previews {
            PreviewMode::Disabled => Body::new(body),
            PreviewMode::Enabled { limit } => {
                let route = route.name().to_string();
                let status = parts.status.as_u16();
                let content_type = parts
                    .headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let on_response = self.on_response.clone();

                Body::new(CaptureBody::new(body, limit, move |preview: Preview| {
                    on_response(ResponseSummary {
                        route,
                        status,
                        content_type,
                        preview,
                    });
                }))
            }
        };
        Response::from_parts(parts, body)
    }
}

fn log_response(summary: ResponseSummary) {
    tracing::info!(
        route = %summary.route,
        status = summary.status,
        content_type = %summary.content_type,
        body = %summary.preview.text,
        truncated = summary.preview.truncated,
        "mcp_response"
    );
}
