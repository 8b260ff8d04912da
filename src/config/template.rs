//! Starter configuration written by `mcp-gateway init`.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const DEFAULT_TEMPLATE: &str = r#"apiVersion: mcp.envoy.io/v1alpha1
kind: GatewayConfig
gateway:
  name: mcp-gateway
  listenAddr: ":8080"
  adminAddr: ":9090"
  logLevel: info
auth:
  requireAuth: true
servers:
  - name: weather-http
    transport: http
    url: http://weather-mcp:8000
  - name: filesystem-local
    transport: stdio
    command: npx
    args: ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
routes:
  - name: weather
    path: /mcp/weather
    server: weather-http
    auth:
      type: jwt
      issuer: https://issuer.example.com
      audience: mcp-gateway
    policy:
      timeoutMs: 10000
      retryCount: 1
      rateLimitRps: 20
  - name: filesystem
    path: /mcp/fs
    server: filesystem-local
    auth:
      type: apiKey
      headerName: X-API-Key
      apiKeys: ["replace-me"]
    policy:
      timeoutMs: 15000
      retryCount: 0
      rateLimitRps: 10
"#;

/// Write the starter configuration to `path`.
///
/// Creates missing parent directories. Refuses to replace an existing
/// file unless `force` is set.
pub fn write_template(path: &Path, force: bool) -> Result<(), TemplateError> {
    if path.exists() && !force {
        return Err(TemplateError::Exists(path.to_path_buf()));
    }
    let io_err = |source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, DEFAULT_TEMPLATE).map_err(io_err)
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{0} already exists (use --force to overwrite)")]
    Exists(PathBuf),

    #[error("write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
