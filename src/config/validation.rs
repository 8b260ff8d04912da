//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing servers)
//! - Check uniqueness of server and route names
//! - Check per-transport and per-auth-type required fields
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, RouteAuth, Transport, API_VERSION, KIND};
use crate::net::listener::parse_bind_address;

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("apiVersion must be mcp.envoy.io/v1alpha1, got {0:?}")]
    ApiVersion(String),

    #[error("kind must be GatewayConfig, got {0:?}")]
    Kind(String),

    #[error("gateway.name is required")]
    MissingGatewayName,

    #[error("gateway.listenAddr is required")]
    MissingListenAddr,

    #[error("gateway.{field} {value:?} is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("servers must include at least one server")]
    NoServers,

    #[error("routes must include at least one route")]
    NoRoutes,

    #[error("servers[].name is required")]
    MissingServerName,

    #[error("duplicate server name: {0}")]
    DuplicateServer(String),

    #[error("server {0:?} transport http requires url")]
    MissingUrl(String),

    #[error("server {server:?} url {url:?} is invalid: {reason}")]
    InvalidUrl {
        server: String,
        url: String,
        reason: String,
    },

    #[error("server {0:?} transport stdio requires command")]
    MissingCommand(String),

    #[error("routes[].name is required")]
    MissingRouteName,

    #[error("duplicate route name: {0}")]
    DuplicateRoute(String),

    #[error("route {0:?} path must start with '/'")]
    InvalidRoutePath(String),

    #[error("route {route:?} references unknown server {server:?}")]
    UnknownServer { route: String, server: String },

    #[error("route {0:?} apiKey auth requires headerName and apiKeys")]
    IncompleteApiKeyAuth(String),

    #[error("route {0:?} jwt auth requires issuer and audience")]
    IncompleteJwtAuth(String),

    #[error("route {route:?} auth type must be apiKey, jwt, or none (got {kind:?})")]
    UnsupportedAuthType { route: String, kind: String },
}

/// Validate a parsed configuration, collecting every violation.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.api_version != API_VERSION {
        errors.push(ValidationError::ApiVersion(config.api_version.clone()));
    }
    if config.kind != KIND {
        errors.push(ValidationError::Kind(config.kind.clone()));
    }

    let gateway = &config.gateway;
    if is_blank(&gateway.name) {
        errors.push(ValidationError::MissingGatewayName);
    }
    if is_blank(&gateway.listen_addr) {
        errors.push(ValidationError::MissingListenAddr);
    } else if parse_bind_address(&gateway.listen_addr).is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listenAddr",
            value: gateway.listen_addr.clone(),
        });
    }
    if let Some(admin) = gateway.admin_addr.as_deref().filter(|a| !is_blank(a)) {
        if parse_bind_address(admin).is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "adminAddr",
                value: admin.to_string(),
            });
        }
    }

    if config.servers.is_empty() {
        errors.push(ValidationError::NoServers);
    }
    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    let mut servers = HashSet::new();
    for server in &config.servers {
        if is_blank(&server.name) {
            errors.push(ValidationError::MissingServerName);
            continue;
        }
        if !servers.insert(server.name.as_str()) {
            errors.push(ValidationError::DuplicateServer(server.name.clone()));
        }

        match &server.transport {
            Transport::Http { url } if is_blank(url) => {
                errors.push(ValidationError::MissingUrl(server.name.clone()));
            }
            Transport::Http { url } => {
                if let Err(reason) = check_upstream_url(url) {
                    errors.push(ValidationError::InvalidUrl {
                        server: server.name.clone(),
                        url: url.clone(),
                        reason,
                    });
                }
            }
            Transport::Stdio { command, .. } if is_blank(command) => {
                errors.push(ValidationError::MissingCommand(server.name.clone()));
            }
            Transport::Stdio { .. } => {}
        }
    }

    let mut routes = HashSet::new();
    for route in &config.routes {
        if is_blank(&route.name) {
            errors.push(ValidationError::MissingRouteName);
            continue;
        }
        if !routes.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        if is_blank(&route.path) || !route.path.starts_with('/') {
            errors.push(ValidationError::InvalidRoutePath(route.name.clone()));
        }
        if !servers.contains(route.server.as_str()) {
            errors.push(ValidationError::UnknownServer {
                route: route.name.clone(),
                server: route.server.clone(),
            });
        }
        if let Some(auth) = &route.auth {
            if let Err(e) = check_route_auth(&route.name, auth) {
                errors.push(e);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_route_auth(route: &str, auth: &RouteAuth) -> Result<(), ValidationError> {
    match auth.kind.as_str() {
        "apiKey" => {
            let header_missing = auth.header_name.as_deref().map_or(true, is_blank);
            if header_missing || auth.api_keys.is_empty() {
                return Err(ValidationError::IncompleteApiKeyAuth(route.to_string()));
            }
        }
        "jwt" => {
            let issuer_missing = auth.issuer.as_deref().map_or(true, is_blank);
            let audience_missing = auth.audience.as_deref().map_or(true, is_blank);
            if issuer_missing || audience_missing {
                return Err(ValidationError::IncompleteJwtAuth(route.to_string()));
            }
        }
        "none" => {}
        other => {
            return Err(ValidationError::UnsupportedAuthType {
                route: route.to_string(),
                kind: other.to_string(),
            });
        }
    }
    Ok(())
}

fn check_upstream_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {:?}, expected http or https", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
