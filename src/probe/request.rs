use serde::{Deserialize, Serialize};

use super::EndpointType;

/// Public request body for host-based checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRequest {
    /// Host name, IP address or (for http/https/crawlsite) a URL.
    pub address: String,

    /// Target port. `0` or absent selects the protocol default.
    #[serde(default)]
    pub port: Option<u16>,

    /// Probe timeout in milliseconds. `0` or absent selects the configured default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl HostRequest {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Public request body for the quantum-safe TLS check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRequest {
    pub url: String,

    #[serde(default)]
    pub port: Option<u16>,
}

impl UrlRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            port: None,
        }
    }
}

/// One inbound check, tagged with the probe family that should serve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeRequest {
    Icmp(HostRequest),
    Dns(HostRequest),
    Http(HostRequest),
    Https(HostRequest),
    Smtp(HostRequest),
    RawConnect(HostRequest),
    NmapProbe(HostRequest),
    CrawlSite(HostRequest),
    Quantum(UrlRequest),
}

impl ProbeRequest {
    pub fn endpoint_type(&self) -> EndpointType {
        match self {
            ProbeRequest::Icmp(_) => EndpointType::Icmp,
            ProbeRequest::Dns(_) => EndpointType::Dns,
            ProbeRequest::Http(_) => EndpointType::Http,
            ProbeRequest::Https(_) => EndpointType::Https,
            ProbeRequest::Smtp(_) => EndpointType::Smtp,
            ProbeRequest::RawConnect(_) => EndpointType::RawConnect,
            ProbeRequest::NmapProbe(_) => EndpointType::NmapProbe,
            ProbeRequest::CrawlSite(_) => EndpointType::CrawlSite,
            ProbeRequest::Quantum(_) => EndpointType::Quantum,
        }
    }

    /// Operation name used in the envelope message trace.
    pub fn operation(&self) -> &'static str {
        match self {
            ProbeRequest::Icmp(_) => "CheckIcmp",
            ProbeRequest::Dns(_) => "CheckDns",
            ProbeRequest::Http(_) => "CheckHttp",
            ProbeRequest::Https(_) => "CheckHttps",
            ProbeRequest::Smtp(_) => "CheckSmtp",
            ProbeRequest::RawConnect(_) => "CheckRawConnect",
            ProbeRequest::NmapProbe(_) => "CheckNmap",
            ProbeRequest::CrawlSite(_) => "CheckCrawlSite",
            ProbeRequest::Quantum(_) => "CheckQuantum",
        }
    }
}
