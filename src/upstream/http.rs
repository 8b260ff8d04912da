//! HTTP upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream's scheme, authority and base path
//!   (plain HTTP or TLS)
//! - Strip hop-by-hop headers in both directions
//! - Append the client address to `X-Forwarded-For`
//! - Stream the upstream response back without buffering
//!
//! # Design Decisions
//! - One pooled hyper client shared by all routes
//! - Requests are sent as HTTP/1.1 regardless of the inbound version
//! - Host header is passed through as received

use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{HeaderName, HeaderValue, CONNECTION};
use axum::http::uri::{Authority, Scheme};
use axum::http::{HeaderMap, Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that apply to a single connection and are never forwarded.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Failure to reach or talk to an upstream.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream uri: {0}")]
    Uri(#[from] axum::http::Error),

    #[error("{}", describe(.0))]
    Transport(#[from] hyper_util::client::legacy::Error),
}

/// Render an error with its source chain, e.g.
/// `client error (Connect): tcp connect error: Connection refused`.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Parsed `http://` or `https://` upstream location.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    base_query: Option<String>,
}

impl HttpTarget {
    pub(crate) fn new(
        scheme: Scheme,
        authority: Authority,
        base_path: String,
        base_query: Option<String>,
    ) -> Self {
        Self {
            scheme,
            authority,
            base_path,
            base_query,
        }
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn base_query(&self) -> Option<&str> {
        self.base_query.as_deref()
    }

    /// Map an inbound request URI onto this upstream.
    ///
    /// The request path is appended to the base path with exactly one `/`
    /// between them; the base query comes first in the merged query.
    pub fn rewrite(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let path = join_path(&self.base_path, uri.path());
        let path_and_query = match merge_query(self.base_query.as_deref(), uri.query()) {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

fn merge_query(base: Option<&str>, request: Option<&str>) -> Option<String> {
    let base = base.unwrap_or_default();
    let request = request.unwrap_or_default();
    match (base.is_empty(), request.is_empty()) {
        (true, true) => None,
        (false, false) => Some(format!("{base}&{request}")),
        _ => Some(format!("{base}{request}")),
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{prior}, {client}"),
        _ => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Shared HTTP client for all http upstreams.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl HttpForwarder {
    /// Client for plain and TLS upstreams, trusting the bundled webpki roots.
    ///
    /// The ring provider is named explicitly: more than one rustls backend
    /// is linked into the binary, so there is no usable process default.
    pub fn new() -> Result<Self, rustls::Error> {
        let connector = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Self { client })
    }

    /// Send `request` to `target` and return the upstream response unread.
    pub async fn forward(
        &self,
        target: &HttpTarget,
        mut request: Request<Body>,
    ) -> Result<Response<Incoming>, ForwardError> {
        let uri = target.rewrite(request.uri())?;
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        *request.uri_mut() = uri;
        *request.version_mut() = Version::HTTP_11;
        strip_hop_by_hop(request.headers_mut());
        if let Some(ip) = client_ip {
            append_forwarded_for(request.headers_mut(), ip);
        }

        tracing::debug!(uri = %request.uri(), method = %request.method(), "Forwarding to upstream");

        let mut response = self.client.request(request).await?;
        strip_hop_by_hop(response.headers_mut());
        Ok(response)
    }
}
