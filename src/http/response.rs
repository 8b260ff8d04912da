//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map per-request failures to HTTP status codes
//! - Render the plain-text or JSON error bodies clients see
//!
//! # Design Decisions
//! - Every per-request error ends here as a response; none escape the handler
//! - 401 bodies carry the auth denial reason verbatim
//! - 501 distinguishes "transport not wired yet" from a failing upstream (502)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::security::AuthError;

/// A request that could not be proxied.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("404 page not found")]
    NoRoute,

    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("{transport} transport bridge not yet wired")]
    TransportNotImplemented {
        route: String,
        server: String,
        transport: &'static str,
    },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoRoute => StatusCode::NOT_FOUND,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::TransportNotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

#[derive(Serialize)]
struct NotImplementedBody<'a> {
    error: String,
    route: &'a str,
    server: &'a str,
    transport: &'a str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            GatewayError::TransportNotImplemented {
                route,
                server,
                transport,
            } => {
                let body = NotImplementedBody {
                    error: self.to_string(),
                    route,
                    server,
                    transport,
                };
                (status, Json(body)).into_response()
            }
            _ => (status, self.to_string()).into_response(),
        }
    }
}
