//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper connection, Axum router, probes)
//!     → request.rs (request ID)
//!     → [routing, auth, upstream dispatch]
//!     → response.rs (error mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
pub use response::GatewayError;
pub use server::{AppState, BuildError, HttpServer};
