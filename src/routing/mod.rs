//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate prefix)
//!     → Return: matched Route or None
//!
//! Route Compilation (at startup):
//!     RouteConfig[] + ServerConfig[]
//!     → Resolve server references
//!     → Sort by path length, longest first (stable)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (longest path first)

pub mod matcher;
pub mod router;

pub use matcher::{decode_path, PathPrefixMatcher};
pub use router::{Route, RouteTable, RouteTableError};
