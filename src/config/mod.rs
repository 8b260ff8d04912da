//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML/TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - Optional fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod template;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError, ConfigFormat};
pub use schema::{
    AuthDefaults, GatewayConfig, GatewaySettings, RouteAuth, RouteConfig, RoutePolicy,
    ServerConfig, Transport,
};
pub use template::{write_template, TemplateError, DEFAULT_TEMPLATE};
pub use validation::{validate_config, ValidationError};
