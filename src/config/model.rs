use std::fmt;

use serde::Deserialize;

use crate::auth::AuthScheme;
use crate::probe::EndpointType;

/// Service configuration as read from the YAML file.
/// Every field has a default so a missing file still yields a usable
/// configuration once the secret arrives through the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Socket address the HTTP host binds to.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Shared secret every caller must present.
    /// Overridden by the `SERVICE_SECRET` environment variable.
    #[serde(default)]
    pub service_secret: Option<ServiceSecret>,

    /// Credential schemes accepted by this deployment.
    #[serde(default = "default_auth_schemes")]
    pub auth_schemes: Vec<AuthScheme>,

    /// Dashboard URL quoted in the setup hint of every result.
    #[serde(default = "default_front_end_url")]
    pub front_end_url: String,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Upper bound on pages fetched by a single crawlsite probe.
    #[serde(default = "default_crawl_max_pages")]
    pub crawl_max_pages: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            service_secret: None,
            auth_schemes: default_auth_schemes(),
            front_end_url: default_front_end_url(),
            timeouts: TimeoutConfig::default(),
            crawl_max_pages: default_crawl_max_pages(),
        }
    }
}

/// Per-protocol probe timeouts in milliseconds, used when the caller sends none.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub icmp_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub dns_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub http_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub smtp_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub quantum_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_ms: default_timeout_ms(),
            icmp_ms: default_timeout_ms(),
            dns_ms: default_timeout_ms(),
            http_ms: default_timeout_ms(),
            smtp_ms: default_timeout_ms(),
            quantum_ms: default_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn for_endpoint(&self, endpoint_type: EndpointType) -> u64 {
        match endpoint_type {
            EndpointType::Icmp => self.icmp_ms,
            EndpointType::Dns => self.dns_ms,
            EndpointType::Http | EndpointType::Https => self.http_ms,
            EndpointType::Smtp => self.smtp_ms,
            EndpointType::Quantum => self.quantum_ms,
            EndpointType::RawConnect | EndpointType::NmapProbe | EndpointType::CrawlSite => {
                self.default_ms
            }
        }
    }
}

/// The service secret. Never printed.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ServiceSecret(String);

impl ServiceSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ServiceSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceSecret(***)")
    }
}

fn default_listen() -> String {
    "0.0.0.0:2086".to_string()
}

fn default_auth_schemes() -> Vec<AuthScheme> {
    vec![AuthScheme::Bearer, AuthScheme::ProxySecret]
}

fn default_front_end_url() -> String {
    "https://freenetworkmonitor.click".to_string()
}

fn default_timeout_ms() -> u64 {
    20000
}

fn default_crawl_max_pages() -> usize {
    10
}
