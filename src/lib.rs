//! MCP gateway runtime.
//!
//! A single HTTP entry point in front of a fleet of MCP servers. Requests are
//! matched to a route by longest path prefix, checked against the route's
//! auth policy and forwarded to the route's upstream.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::listener ──▶ http::server ──▶ routing ──▶ security
//!                                       │                          │
//!                                       ▼                          ▼
//!                              observability              upstream::dispatcher
//!                       (access log, previews, metrics)     http │ stdio (501)
//!                                                                ▼
//!                                                          MCP server
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;
pub mod upstream;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
