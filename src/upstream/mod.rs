//! Upstream dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Authorized request + matched Route
//!     → dispatcher.rs (select strategy by transport)
//!         Http  → http.rs (rewrite URI, strip hop-by-hop, forward, stream back)
//!         Stdio → 501 placeholder
//!     → Response streamed to the client (optionally through a CaptureBody)
//! ```
//!
//! # Design Decisions
//! - Transport is a closed enum: adding one is a compile-checked change
//! - Upstream URLs are parsed once when the route table is built
//! - Dropping the handler future (client disconnect) drops the upstream call

pub mod dispatcher;
pub mod http;

use std::str::FromStr;

use axum::http::uri::{Authority, Scheme};
use thiserror::Error;
use url::Url;

use crate::config::Transport;

pub use dispatcher::Dispatcher;
pub use http::{HttpForwarder, HttpTarget};

/// Errors in an upstream definition, detected at startup.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid url {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme {0:?}, expected http or https")]
    Scheme(String),

    #[error("url {0:?} has no host")]
    MissingHost(String),

    #[error("invalid authority: {0}")]
    Authority(#[from] axum::http::uri::InvalidUri),
}

/// Resolved upstream for a server.
#[derive(Debug, Clone)]
pub enum Upstream {
    Http(HttpTarget),
    Stdio { command: String, args: Vec<String> },
}

impl Upstream {
    pub fn from_transport(transport: &Transport) -> Result<Self, TargetError> {
        match transport {
            Transport::Http { url } => Ok(Upstream::Http(HttpTarget::parse(url)?)),
            Transport::Stdio { command, args } => Ok(Upstream::Stdio {
                command: command.clone(),
                args: args.clone(),
            }),
        }
    }

    /// Transport tag, as reported in logs and the 501 body.
    pub fn transport(&self) -> &'static str {
        match self {
            Upstream::Http(_) => "http",
            Upstream::Stdio { .. } => "stdio",
        }
    }
}

impl HttpTarget {
    /// Parse an `http(s)://host[:port][/base][?query]` upstream URL.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let url = Url::parse(raw).map_err(|source| TargetError::Url {
            url: raw.to_string(),
            source,
        })?;
        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(TargetError::Scheme(other.to_string())),
        };
        let host = url
            .host_str()
            .ok_or_else(|| TargetError::MissingHost(raw.to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(HttpTarget::new(
            scheme,
            Authority::from_str(&authority)?,
            url.path().to_string(),
            url.query().map(str::to_string),
        ))
    }
}
