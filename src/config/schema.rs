//! Configuration schema definitions.
//!
//! This module defines the complete configuration document for the gateway.
//! All types derive Serde traits and use the camelCase keys of the
//! `GatewayConfig` document (`listenAddr`, `requireAuth`, `apiKeys`, ...).
//! Unknown keys are rejected at every level, so a misspelled option fails
//! the load instead of silently taking its default.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only accepted `apiVersion`.
pub const API_VERSION: &str = "mcp.envoy.io/v1alpha1";

/// The only accepted `kind`.
pub const KIND: &str = "GatewayConfig";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatewayConfig {
    pub api_version: String,

    pub kind: String,

    /// Listener and runtime options.
    pub gateway: GatewaySettings,

    /// Auth defaults applied to routes without an override.
    #[serde(default)]
    pub auth: AuthDefaults,

    /// Upstream MCP servers, in declaration order.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Public routes, in declaration order.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Listener and runtime options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatewaySettings {
    /// Gateway identity used in logs.
    pub name: String,

    /// Bind address (e.g. "0.0.0.0:8080" or ":8080").
    pub listen_addr: String,

    /// Optional bind address for the Prometheus metrics listener.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_addr: Option<String>,

    /// Default log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum concurrent inbound connections (backpressure).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Upper bound on the time a client may take to send request headers.
    #[serde(default = "default_header_read_timeout_ms")]
    pub header_read_timeout_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_header_read_timeout_ms() -> u64 {
    5_000
}

impl GatewaySettings {
    /// Settings with the given name and listen address and defaults elsewhere.
    pub fn new(name: impl Into<String>, listen_addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listen_addr: listen_addr.into(),
            admin_addr: None,
            log_level: default_log_level(),
            max_connections: default_max_connections(),
            header_read_timeout_ms: default_header_read_timeout_ms(),
        }
    }
}

/// Secure-by-default auth settings.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthDefaults {
    /// When true, routes without an auth override require an API key.
    #[serde(default)]
    pub require_auth: bool,
}

/// An MCP upstream server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Unique server name referenced by routes.
    pub name: String,

    /// How the gateway reaches this server, from the `transport` key.
    pub transport: Transport,
}

/// Transport used to reach an upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Streamable HTTP upstream.
    Http { url: String },

    /// Local process speaking MCP over stdin/stdout.
    Stdio { command: String, args: Vec<String> },
}

/// A server entry as written in the document.
///
/// Transport fields sit beside `name` with `transport` as the tag. Reading
/// them through one flat struct keeps unknown-key rejection, which serde
/// loses under `flatten`. A field the chosen transport does not use is
/// accepted and ignored; a missing one is left blank for validation.
#[derive(Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ServerEntry {
    name: String,
    #[serde(default)]
    transport: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
}

impl<'de> Deserialize<'de> for ServerConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entry = ServerEntry::deserialize(deserializer)?;
        let transport = match entry.transport.as_str() {
            "http" => Transport::Http {
                url: entry.url.unwrap_or_default(),
            },
            "stdio" => Transport::Stdio {
                command: entry.command.unwrap_or_default(),
                args: entry.args,
            },
            "" => {
                return Err(de::Error::custom(format!(
                    "server {:?}: missing transport",
                    entry.name
                )))
            }
            other => {
                return Err(de::Error::custom(format!(
                    "server {:?}: unknown transport {other:?}, expected http or stdio",
                    entry.name
                )))
            }
        };
        Ok(ServerConfig {
            name: entry.name,
            transport,
        })
    }
}

impl Serialize for ServerConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entry = ServerEntry {
            name: self.name.clone(),
            transport: self.transport.tag().to_string(),
            url: None,
            command: None,
            args: Vec::new(),
        };
        match &self.transport {
            Transport::Http { url } => entry.url = Some(url.clone()),
            Transport::Stdio { command, args } => {
                entry.command = Some(command.clone());
                entry.args = args.clone();
            }
        }
        entry.serialize(serializer)
    }
}

impl Transport {
    /// The transport tag as written in configuration.
    pub fn tag(&self) -> &'static str {
        match self {
            Transport::Http { .. } => "http",
            Transport::Stdio { .. } => "stdio",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Maps a public path prefix to an upstream server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match. Must start with `/`.
    pub path: String,

    /// Name of the server to forward to.
    pub server: String,

    /// Per-route auth override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<RouteAuth>,

    /// Traffic policy. Declared only; see `RoutePolicy`.
    #[serde(default)]
    pub policy: RoutePolicy,
}

impl RouteConfig {
    /// A route with no auth override and an empty policy.
    pub fn new(name: impl Into<String>, path: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            server: server.into(),
            auth: None,
            policy: RoutePolicy::default(),
        }
    }
}

/// Per-route auth override.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouteAuth {
    /// `apiKey`, `jwt` or `none`. Blank falls back to the defaults.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Header carrying the API key (apiKey only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,

    /// Accepted API keys (apiKey only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<String>,

    /// Expected token issuer (jwt only, not verified).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Expected token audience (jwt only, not verified).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

/// Baseline traffic control settings.
///
/// These values are carried through configuration but the runtime does not
/// enforce them; startup logs a warning for every route that declares one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoutePolicy {
    #[serde(default)]
    pub timeout_ms: u64,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(default)]
    pub rate_limit_rps: u32,
}

impl RoutePolicy {
    /// True if any field is set to a non-zero value.
    pub fn is_declared(&self) -> bool {
        self.timeout_ms > 0 || self.retry_count > 0 || self.rate_limit_rps > 0
    }
}

/// Whether body previews are captured, read from `GATEWAY_LOG_BODIES`.
pub fn log_bodies_from_env() -> bool {
    std::env::var("GATEWAY_LOG_BODIES")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
