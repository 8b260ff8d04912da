//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every gateway request:
//!     → access_log.rs (one structured line per request)
//!     → metrics.rs (counters, histograms)
//!     → capture.rs (bounded body previews, opt-in)
//!
//! Consumers:
//!     → stdout (tracing fmt layer)
//!     → Metrics endpoint (Prometheus scrape on adminAddr)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through logs via the x-request-id header
//! - Body previews never alter the bytes delivered to either side

pub mod access_log;
pub mod capture;
pub mod logging;
pub mod metrics;

pub use access_log::{access_log, MatchedRoute};
pub use capture::{CaptureBody, Preview, PreviewMode, PREVIEW_LIMIT};
