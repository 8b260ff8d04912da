//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Check and resolve configured bind addresses (`host:port` or `:port`)
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address {addr:?}: {reason}")]
    Address { addr: String, reason: &'static str },

    #[error("failed to resolve {addr:?}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind: {0}")]
    Bind(#[source] io::Error),

    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),

    #[error("connection limiter closed")]
    Closed,
}

/// Check the shape of a bind address and expand the `:port` shorthand to
/// every interface. Hostnames are kept as given and resolve at bind time.
pub fn parse_bind_address(addr: &str) -> Result<String, ListenerError> {
    let addr = addr.trim();
    let invalid = |reason| ListenerError::Address {
        addr: addr.to_string(),
        reason,
    };

    let full = match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    };
    let (host, port) = full.rsplit_once(':').ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(invalid("IPv6 hosts must be bracketed"));
    }
    port.parse::<u16>()
        .map_err(|_| invalid("port must be a number from 0 to 65535"))?;

    Ok(full)
}

/// Resolve a bind address to the first socket address it names.
pub async fn resolve_bind_address(addr: &str) -> Result<SocketAddr, ListenerError> {
    let full = parse_bind_address(addr)?;
    let resolve_error = |source| ListenerError::Resolve {
        addr: full.clone(),
        source,
    };

    let resolved = tokio::net::lookup_host(full.as_str())
        .await
        .map_err(resolve_error)?
        .next()
        .ok_or_else(|| resolve_error(io::Error::new(io::ErrorKind::NotFound, "no addresses found")));
    resolved
}

/// A bounded TCP listener that limits concurrent connections.
///
/// When the limit is reached, accepting waits until a slot becomes available.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Wrap an already bound listener.
    pub fn from_tcp(listener: TcpListener, max_connections: usize) -> Result<Self, ListenerError> {
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        let max_connections = max_connections.max(1);

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// The returned permit must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }
}

/// A connection slot, released back to the listener on drop.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
