//! Route-level authentication.
//!
//! # Responsibilities
//! - Resolve the effective auth type for a route
//! - Check API keys and bearer token presence against request headers
//! - Produce a human-readable denial reason for the 401 body
//!
//! # Design Decisions
//! - Pure function: no I/O, no shared state
//! - API keys are compared with plain string equality, not in constant time
//! - An API key route with no configured keys accepts any non-empty key
//! - Bearer tokens are checked for shape only. `issuer`/`audience` are
//!   carried in configuration but no signature, expiry or claim checks run.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use thiserror::Error;

use crate::config::{AuthDefaults, RouteAuth};

/// Header read for API keys when a route does not name one.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Reason a request was denied. The message is the 401 response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing API key")]
    MissingApiKey,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("missing bearer token")]
    MissingBearerToken,

    #[error("unsupported auth type {0:?}")]
    UnsupportedType(String),
}

/// Effective auth mode for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthType {
    None,
    ApiKey,
    Jwt,
    Unsupported(String),
}

impl AuthType {
    /// Override type if present and non-blank, otherwise the config default.
    pub fn resolve(route: Option<&RouteAuth>, defaults: &AuthDefaults) -> Self {
        match route.map(|auth| auth.kind.trim()).filter(|kind| !kind.is_empty()) {
            Some("none") => AuthType::None,
            Some("apiKey") => AuthType::ApiKey,
            Some("jwt") => AuthType::Jwt,
            Some(other) => AuthType::Unsupported(other.to_string()),
            None if defaults.require_auth => AuthType::ApiKey,
            None => AuthType::None,
        }
    }
}

/// Decide whether a request may reach the route's upstream.
pub fn enforce(
    route: Option<&RouteAuth>,
    defaults: &AuthDefaults,
    headers: &HeaderMap,
) -> Result<(), AuthError> {
    match AuthType::resolve(route, defaults) {
        AuthType::None => Ok(()),
        AuthType::ApiKey => check_api_key(route, headers),
        AuthType::Jwt => check_bearer(headers),
        AuthType::Unsupported(kind) => Err(AuthError::UnsupportedType(kind)),
    }
}

fn check_api_key(route: Option<&RouteAuth>, headers: &HeaderMap) -> Result<(), AuthError> {
    let header = route
        .and_then(|auth| auth.header_name.as_deref())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(DEFAULT_API_KEY_HEADER);
    let accepted: &[String] = route.map(|auth| auth.api_keys.as_slice()).unwrap_or(&[]);

    let presented = header_str(headers, header)
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingApiKey)?;

    if accepted.is_empty() || accepted.iter().any(|key| key == presented) {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}

fn check_bearer(headers: &HeaderMap) -> Result<(), AuthError> {
    let value = header_str(headers, AUTHORIZATION.as_str()).unwrap_or_default();
    match value.trim().strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(()),
        _ => Err(AuthError::MissingBearerToken),
    }
}

/// Header value as text. Invalid header names or non-visible-ASCII values
/// read as absent.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn api_key_auth(keys: &[&str]) -> RouteAuth {
        RouteAuth {
            kind: "apiKey".into(),
            header_name: Some("X-API-Key".into()),
            api_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    fn jwt_auth() -> RouteAuth {
        RouteAuth {
            kind: "jwt".into(),
            issuer: Some("https://issuer.example.com".into()),
            audience: Some("mcp-gateway".into()),
            ..Default::default()
        }
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    const OPEN: AuthDefaults = AuthDefaults { require_auth: false };
    const SECURE: AuthDefaults = AuthDefaults { require_auth: true };

    #[test]
    fn effective_type_resolution() {
        assert_eq!(AuthType::resolve(None, &OPEN), AuthType::None);
        assert_eq!(AuthType::resolve(None, &SECURE), AuthType::ApiKey);

        let blank = RouteAuth { kind: "  ".into(), ..Default::default() };
        assert_eq!(AuthType::resolve(Some(&blank), &SECURE), AuthType::ApiKey);
        assert_eq!(AuthType::resolve(Some(&blank), &OPEN), AuthType::None);

        let none = RouteAuth { kind: "none".into(), ..Default::default() };
        assert_eq!(AuthType::resolve(Some(&none), &SECURE), AuthType::None);
        assert_eq!(AuthType::resolve(Some(&jwt_auth()), &OPEN), AuthType::Jwt);
    }

    #[test]
    fn no_auth_always_allows() {
        assert_eq!(enforce(None, &OPEN, &HeaderMap::new()), Ok(()));
    }

    #[test]
    fn api_key_accepted_missing_and_wrong() {
        let auth = api_key_auth(&["secret"]);

        let ok = headers(&[("x-api-key", "secret")]);
        assert_eq!(enforce(Some(&auth), &OPEN, &ok), Ok(()));

        assert_eq!(
            enforce(Some(&auth), &OPEN, &HeaderMap::new()),
            Err(AuthError::MissingApiKey)
        );

        let wrong = headers(&[("x-api-key", "wrong")]);
        assert_eq!(enforce(Some(&auth), &OPEN, &wrong), Err(AuthError::InvalidApiKey));
    }

    #[test]
    fn api_key_messages() {
        assert_eq!(AuthError::MissingApiKey.to_string(), "missing API key");
        assert_eq!(AuthError::InvalidApiKey.to_string(), "invalid API key");
        assert_eq!(
            AuthError::UnsupportedType("basic".into()).to_string(),
            "unsupported auth type \"basic\""
        );
    }

    #[test]
    fn empty_key_is_missing() {
        let auth = api_key_auth(&["secret"]);
        let empty = headers(&[("x-api-key", "")]);
        assert_eq!(enforce(Some(&auth), &OPEN, &empty), Err(AuthError::MissingApiKey));
    }

    #[test]
    fn secure_default_accepts_any_key_when_none_configured() {
        assert_eq!(
            enforce(None, &SECURE, &HeaderMap::new()),
            Err(AuthError::MissingApiKey)
        );
        let any = headers(&[("x-api-key", "whatever")]);
        assert_eq!(enforce(None, &SECURE, &any), Ok(()));
    }

    #[test]
    fn custom_header_name_is_used() {
        let auth = RouteAuth {
            header_name: Some("X-Gateway-Token".into()),
            ..api_key_auth(&["t0k"])
        };
        let default_header = headers(&[("x-api-key", "t0k")]);
        assert_eq!(
            enforce(Some(&auth), &OPEN, &default_header),
            Err(AuthError::MissingApiKey)
        );
        let custom = headers(&[("x-gateway-token", "t0k")]);
        assert_eq!(enforce(Some(&auth), &OPEN, &custom), Ok(()));
    }

    #[test]
    fn bearer_shape_only() {
        let auth = jwt_auth();

        let ok = headers(&[("authorization", "Bearer abc")]);
        assert_eq!(enforce(Some(&auth), &OPEN, &ok), Ok(()));

        for bad in ["", "Bearer", "Bearer    ", "Basic abc", "bearer abc"] {
            let h = headers(&[("authorization", bad)]);
            assert_eq!(
                enforce(Some(&auth), &OPEN, &h),
                Err(AuthError::MissingBearerToken),
                "header {bad:?} should be rejected"
            );
        }
        assert_eq!(
            enforce(Some(&auth), &OPEN, &HeaderMap::new()),
            Err(AuthError::MissingBearerToken)
        );
    }

    #[test]
    fn unknown_type_is_denied() {
        let auth = RouteAuth { kind: "basic".into(), ..Default::default() };
        assert_eq!(
            enforce(Some(&auth), &OPEN, &HeaderMap::new()),
            Err(AuthError::UnsupportedType("basic".into()))
        );
    }
}
