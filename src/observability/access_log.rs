//! Per-request access logging.

use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;

use crate::http::request::request_id;
use crate::observability::capture::CaptureBody;
use crate::observability::metrics::{self, UNMATCHED_ROUTE};

/// Name of the route that served a response, set by the gateway handler.
#[derive(Debug, Clone)]
pub struct MatchedRoute(pub String);

/// Emit one `request` line once the response body has been sent.
///
/// Duration and metrics cover the whole exchange, streamed bodies included.
pub async fn access_log(request: Request, next: Next) -> Response {
    let entry = AccessEntry::begin(&request);
    let response = next.run(request).await;
    entry.attach(response, AccessEntry::emit)
}

/// What is known about a request before it is handled.
struct AccessEntry {
    start: Instant,
    method: Method,
    path: String,
    request_id: String,
}

impl AccessEntry {
    fn begin(request: &Request) -> Self {
        Self {
            start: Instant::now(),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            request_id: request_id(request.headers()).unwrap_or("-").to_string(),
        }
    }

    /// Defer `finish` until the response body completes or is dropped.
    fn attach<F>(self, response: Response, finish: F) -> Response
    where
        F: FnOnce(Self, u16, String) + Send + 'static,
    {
        let status = response.status().as_u16();
        let route = response
            .extensions()
            .get::<MatchedRoute>()
            .map_or(UNMATCHED_ROUTE, |r| r.0.as_str())
            .to_string();

        let (parts, body) = response.into_parts();
        let body = CaptureBody::completion(body, move || finish(self, status, route));
        Response::from_parts(parts, Body::new(body))
    }

    fn emit(self, status: u16, route: String) {
        tracing::info!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            route = %route,
            status,
            duration_ms = self.start.elapsed().as_millis() as u64,
            "request"
        );
        metrics::record_request(self.method.as_str(), status, &route, self.start);
    }
}
