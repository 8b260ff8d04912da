//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route + request headers:
//!     → auth.rs (resolve auth type, check API key / bearer token)
//!     → allow: continue to dispatch
//!     → deny: 401 with the denial reason
//! ```
//!
//! # Design Decisions
//! - Fail closed: unknown auth types are denied
//! - Decisions depend only on configuration and headers

pub mod auth;

pub use auth::{enforce, AuthError, AuthType, DEFAULT_API_KEY_HEADER};
