//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes, longest path first
//! - Resolve every route's server reference once, at startup
//! - Look up matching route for a request path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Explicit no-match (`None`) rather than silent default

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{RouteAuth, RouteConfig, ServerConfig};
use crate::routing::matcher::PathPrefixMatcher;
use crate::upstream::{TargetError, Upstream};

/// Errors raised while compiling the route table.
#[derive(Debug, Error)]
pub enum RouteTableError {
    #[error("route {route:?} references unknown server {server:?}")]
    UnknownServer { route: String, server: String },

    #[error("server {server:?}: {source}")]
    InvalidUpstream {
        server: String,
        #[source]
        source: TargetError,
    },
}

/// A compiled route with its server already resolved.
#[derive(Debug)]
pub struct Route {
    config: RouteConfig,
    matcher: PathPrefixMatcher,
    upstream: Arc<Upstream>,
}

impl Route {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The configured path prefix.
    pub fn path(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn server_name(&self) -> &str {
        &self.config.server
    }

    pub fn auth(&self) -> Option<&RouteAuth> {
        self.config.auth.as_ref()
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    pub fn matcher(&self) -> &PathPrefixMatcher {
        &self.matcher
    }
}

/// Immutable route table implementing longest-prefix-wins.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile routes against the declared servers.
    ///
    /// Routes are ordered by descending path length; the sort is stable so
    /// equal lengths keep their declaration order.
    pub fn build(routes: &[RouteConfig], servers: &[ServerConfig]) -> Result<Self, RouteTableError> {
        let mut upstreams: HashMap<&str, Arc<Upstream>> = HashMap::with_capacity(servers.len());
        for server in servers {
            let upstream = Upstream::from_transport(&server.transport).map_err(|source| {
                RouteTableError::InvalidUpstream {
                    server: server.name.clone(),
                    source,
                }
            })?;
            upstreams.insert(server.name.as_str(), Arc::new(upstream));
        }

        let mut compiled = Vec::with_capacity(routes.len());
        for route in routes {
            let upstream = upstreams
                .get(route.server.as_str())
                .cloned()
                .ok_or_else(|| RouteTableError::UnknownServer {
                    route: route.name.clone(),
                    server: route.server.clone(),
                })?;

            compiled.push(Route {
                config: route.clone(),
                matcher: PathPrefixMatcher::new(route.path.clone()),
                upstream,
            });
        }

        compiled.sort_by(|a, b| b.path().len().cmp(&a.path().len()));

        tracing::debug!(
            routes = ?compiled.iter().map(|r| r.path()).collect::<Vec<_>>(),
            "Route table compiled"
        );

        Ok(Self { routes: compiled })
    }

    /// Return the first (longest) route whose path prefixes `path`.
    ///
    /// `path` is the decoded request path; see [`decode_path`].
    ///
    /// [`decode_path`]: crate::routing::matcher::decode_path
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matcher.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Transport;

    fn servers() -> Vec<ServerConfig> {
        vec![
            ServerConfig {
                name: "s1".into(),
                transport: Transport::Http { url: "http://127.0.0.1:9000".into() },
            },
            ServerConfig {
                name: "fs".into(),
                transport: Transport::Stdio { command: "npx".into(), args: vec![] },
            },
        ]
    }

    #[test]
    fn longest_prefix_wins() {
        let routes = vec![
            RouteConfig::new("short", "/mcp", "s1"),
            RouteConfig::new("long", "/mcp/weather", "s1"),
        ];
        let table = RouteTable::build(&routes, &servers()).unwrap();

        assert_eq!(table.match_path("/mcp/weather").unwrap().name(), "long");
        assert_eq!(table.match_path("/mcp/weather/forecast").unwrap().name(), "long");
        assert_eq!(table.match_path("/mcp/fs").unwrap().name(), "short");
    }

    #[test]
    fn equal_lengths_keep_declaration_order() {
        let routes = vec![
            RouteConfig::new("first", "/aaa", "s1"),
            RouteConfig::new("root", "/", "s1"),
            RouteConfig::new("second", "/bbb", "fs"),
            RouteConfig::new("third", "/ccc", "s1"),
        ];
        let table = RouteTable::build(&routes, &servers()).unwrap();

        let order: Vec<_> = table.routes.iter().map(Route::name).collect();
        assert_eq!(order, vec!["first", "second", "third", "root"]);
    }

    #[test]
    fn unmatched_path_is_none() {
        let routes = vec![RouteConfig::new("r1", "/mcp", "s1")];
        let table = RouteTable::build(&routes, &servers()).unwrap();

        assert!(table.match_path("/other").is_none());
        assert!(table.match_path("/").is_none());
        // Raw string prefix: `/mcp` also claims `/mcpx`.
        assert_eq!(table.match_path("/mcpx").unwrap().name(), "r1");
    }

    #[test]
    fn server_reference_is_resolved() {
        let routes = vec![RouteConfig::new("fs", "/mcp/fs", "fs")];
        let table = RouteTable::build(&routes, &servers()).unwrap();

        let route = table.match_path("/mcp/fs").unwrap();
        assert_eq!(route.server_name(), "fs");
        assert_eq!(route.upstream().transport(), "stdio");
    }

    #[test]
    fn unknown_server_fails_build() {
        let routes = vec![RouteConfig::new("r1", "/mcp", "missing")];
        let err = RouteTable::build(&routes, &servers()).unwrap_err();
        assert!(matches!(err, RouteTableError::UnknownServer { .. }));
    }
}
