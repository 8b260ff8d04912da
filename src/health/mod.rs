//! Liveness and readiness probes.
//!
//! Both answer any method with 200 and are served outside route matching,
//! auth and access logging. Readiness is unconditional once the listener
//! accepts connections.

use axum::routing::any;
use axum::Router;

pub const HEALTHZ_PATH: &str = "/healthz";
pub const READYZ_PATH: &str = "/readyz";

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn readyz() -> &'static str {
    "ready"
}

/// Router serving the probe endpoints.
pub fn probes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(HEALTHZ_PATH, any(healthz))
        .route(READYZ_PATH, any(readyz))
}
