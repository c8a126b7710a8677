//! Caller authentication.
//!
//! Two credential schemes are recognized and both are always checked; a
//! deployment decides which of them are live. Comparison against the service
//! secret is constant-time and the secret is never logged.

use axum::http::{HeaderMap, header};
use constant_time_eq::constant_time_eq;
use serde::Deserialize;
use tracing::warn;

use crate::config::ServiceSecret;
use crate::errors::AuthorizationError;

pub const PROXY_SECRET_HEADER: &str = "x-proxy-secret";
pub const RAPIDAPI_PROXY_SECRET_HEADER: &str = "x-rapidapi-proxy-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Authorization: Bearer <secret>`
    Bearer,
    /// `X-Proxy-Secret` or `X-RapidAPI-Proxy-Secret`, either one matching.
    ProxySecret,
}

impl AuthScheme {
    pub const ALL: [AuthScheme; 2] = [AuthScheme::Bearer, AuthScheme::ProxySecret];

    pub fn name(&self) -> &'static str {
        match self {
            AuthScheme::Bearer => "bearer",
            AuthScheme::ProxySecret => "proxy_secret",
        }
    }

    /// Credentials this scheme finds in `headers`, in presentation order.
    fn presented<'a>(&self, headers: &'a HeaderMap) -> Vec<&'a str> {
        match self {
            AuthScheme::Bearer => headers
                .get_all(header::AUTHORIZATION)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .filter_map(bearer_token)
                .collect(),
            AuthScheme::ProxySecret => [PROXY_SECRET_HEADER, RAPIDAPI_PROXY_SECRET_HEADER]
                .iter()
                .filter_map(|name| headers.get(*name))
                .filter_map(|value| value.to_str().ok())
                .collect(),
        }
    }
}

/// Token of an `Authorization` value whose scheme is `Bearer` in any case.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("Bearer").then(|| token.trim())
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    secret: ServiceSecret,
    live: Vec<AuthScheme>,
}

impl AuthGate {
    pub fn new(secret: ServiceSecret, live: Vec<AuthScheme>) -> Self {
        Self { secret, live }
    }

    /// Authorize a request from its headers, returning the scheme that matched.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<AuthScheme, AuthorizationError> {
        let mut rejected_by = None;

        for scheme in AuthScheme::ALL {
            let presented = scheme.presented(headers);
            if presented.is_empty() {
                continue;
            }
            if !self.live.contains(&scheme) {
                rejected_by.get_or_insert(scheme);
                continue;
            }
            if presented
                .iter()
                .any(|candidate| constant_time_eq(candidate.as_bytes(), self.secret.expose().as_bytes()))
            {
                return Ok(scheme);
            }
            rejected_by.get_or_insert(scheme);
        }

        let err = match rejected_by {
            Some(scheme) => AuthorizationError::InvalidCredentials(scheme.name()),
            None => AuthorizationError::MissingCredentials,
        };
        warn!(reason = %err, "rejected unauthorized request");
        Err(err)
    }
}
