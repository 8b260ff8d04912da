//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order (metrics, routes, listener)
//! - Surface configuration the runtime accepts but does not act on
//! - Wire OS signals to the shutdown coordinator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::{BuildError, HttpServer};
use crate::lifecycle::signals::shutdown_signal;
use crate::lifecycle::Shutdown;
use crate::net::{parse_bind_address, resolve_bind_address, ListenerError};
use crate::observability::capture::PreviewMode;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Server(#[from] BuildError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Log a warning for every route declaring a policy the runtime ignores.
///
/// Returns the names of those routes.
pub fn report_unenforced_policies(config: &GatewayConfig) -> Vec<&str> {
    config
        .routes
        .iter()
        .filter(|route| route.policy.is_declared())
        .map(|route| {
            tracing::warn!(
                route = %route.name,
                timeout_ms = route.policy.timeout_ms,
                retry_count = route.policy.retry_count,
                rate_limit_rps = route.policy.rate_limit_rps,
                "Route policy is declared but not enforced"
            );
            route.name.as_str()
        })
        .collect()
}

/// Serve `config` until SIGINT or SIGTERM, then drain.
pub async fn serve(config: GatewayConfig, previews: PreviewMode) -> Result<(), StartupError> {
    let settings = &config.gateway;

    if let Some(admin) = settings.admin_addr.as_deref().filter(|a| !a.trim().is_empty()) {
        metrics::init_metrics(resolve_bind_address(admin).await?)?;
    }

    report_unenforced_policies(&config);
    if previews.is_enabled() {
        tracing::info!("Body previews enabled");
    }

    let server = HttpServer::new(&config, previews)?;
    let addr = parse_bind_address(&settings.listen_addr)?;
    let listener = TcpListener::bind(addr.as_str())
        .await
        .map_err(ListenerError::Bind)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
