//! Error types for netprobe
//!
//! Every failure past authorization ends up as text in a result envelope, so
//! these types mostly exist to keep the stages honest about what went wrong.
//! Messages MUST NOT contain the service secret.

use std::fmt::Write;
use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::probe::EndpointType;

/// Credential missing or not matching the service secret.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("No credential header presented")]
    MissingCredentials,

    #[error("Credential presented via {0} did not match")]
    InvalidCredentials(&'static str),
}

/// Target rejected before any connector is acquired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Address is empty for {0} check")]
    EmptyAddress(EndpointType),

    #[error("Address '{address}' is not valid for {endpoint_type} check: {reason}")]
    MalformedAddress {
        endpoint_type: EndpointType,
        address: String,
        reason: String,
    },

    #[error("Unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("A port is required for {0} check")]
    MissingPort(EndpointType),
}

/// Unexpected failure of the connector engine itself.
#[derive(Debug, thiserror::Error)]
pub enum EngineFault {
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Connector resources unavailable: {0}")]
    Resource(String),

    #[error("Connector panicked: {0}")]
    Panicked(String),
}

/// Anything that can go wrong between normalization and mapping.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Engine(#[from] EngineFault),
}

/// Startup configuration failures. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Fatal error: no service secret configured (set service_secret or SERVICE_SECRET)")]
    MissingSecret,

    #[error("Invalid listen address '{0}'")]
    InvalidListen(String),

    #[error("Invalid DNS host '{0}'")]
    InvalidDnsHost(String),
}

/// Flatten an error and its sources into one line of diagnostic text.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, "\n\nCaused by: {}", src);
        err = src;
    }
    s
}

/// Transport-level rejection, rendered as `{"error": {"message", "status"}}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(_: AuthorizationError) -> Self {
        // The reason is logged by the gate; callers only learn that they were rejected.
        Self::unauthorized("Unauthorized")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}
