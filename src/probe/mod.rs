pub mod mapper;
pub mod normalize;
pub mod request;
pub mod result;

pub mod prelude {
    pub use super::mapper::{check_result, quantum_check_result};
    pub use super::normalize::normalize;
    pub use super::request::{HostRequest, ProbeRequest, UrlRequest};
    pub use super::result::{CheckResult, FailureKind, QuantumCheckResult, ResultEnvelope};
    pub use super::{EndpointType, ProbeDescriptor, ProbeOutcome, Verdict};
}

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reserved round-trip value meaning "no measurement was taken".
pub const TIMEOUT_SENTINEL: u16 = u16::MAX;

/// The protocol a probe exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointType {
    #[serde(rename = "icmp")]
    Icmp,
    #[serde(rename = "dns")]
    Dns,
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "https")]
    Https,
    #[serde(rename = "smtp")]
    Smtp,
    #[serde(rename = "rawconnect")]
    RawConnect,
    #[serde(rename = "nmap-probe")]
    NmapProbe,
    #[serde(rename = "quantum")]
    Quantum,
    #[serde(rename = "crawlsite")]
    CrawlSite,
}

impl EndpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointType::Icmp => "icmp",
            EndpointType::Dns => "dns",
            EndpointType::Http => "http",
            EndpointType::Https => "https",
            EndpointType::Smtp => "smtp",
            EndpointType::RawConnect => "rawconnect",
            EndpointType::NmapProbe => "nmap-probe",
            EndpointType::Quantum => "quantum",
            EndpointType::CrawlSite => "crawlsite",
        }
    }

    /// First segment of every status line the engine produces for this type.
    pub fn status_prefix(&self) -> &'static str {
        match self {
            EndpointType::Icmp => "ICMP",
            EndpointType::Dns => "DNS",
            EndpointType::Http => "HTTP",
            EndpointType::Https => "HTTPS",
            EndpointType::Smtp => "SMTP",
            EndpointType::RawConnect => "RAWCONNECT",
            EndpointType::NmapProbe => "NMAP",
            EndpointType::Quantum => "QUANTUM",
            EndpointType::CrawlSite => "CRAWLSITE",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical probe request handed to a [`crate::engine::ConnectorPool`].
///
/// Built only by [`normalize::normalize`], so `address` is never empty and
/// `timeout_ms` is always positive. A `port` of `None` lets the engine pick
/// the protocol default (for http/https: whatever the URL scheme implies).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeDescriptor {
    pub address: String,
    pub port: Option<u16>,
    pub endpoint_type: EndpointType,
    pub timeout_ms: u64,
}

impl ProbeDescriptor {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The port the probe actually targets, when one applies to the protocol.
    pub fn effective_port(&self) -> Option<u16> {
        match self.endpoint_type {
            EndpointType::Icmp | EndpointType::Dns => None,
            EndpointType::Http => Some(self.port.unwrap_or(80)),
            EndpointType::Https | EndpointType::Quantum => Some(self.port.unwrap_or(443)),
            EndpointType::Smtp => Some(self.port.unwrap_or(25)),
            EndpointType::RawConnect | EndpointType::NmapProbe | EndpointType::CrawlSite => {
                self.port
            }
        }
    }
}

/// Verdict word carried in the second segment of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure,
    Timeout,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => f.write_str("Success"),
            Verdict::Failure => f.write_str("Failure"),
            Verdict::Timeout => f.write_str("Timeout"),
        }
    }
}

/// Raw result of a single probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub is_up: bool,
    pub round_trip_ms: Option<u16>,
    pub status_message: String,
    pub timeout_ms: u64,
}

impl ProbeOutcome {
    /// Build an outcome from an engine that still reports the round trip as a
    /// bare `u16`, where [`TIMEOUT_SENTINEL`] means "not measured".
    pub fn from_raw_round_trip(
        is_up: bool,
        round_trip: u16,
        status_message: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            is_up,
            round_trip_ms: (round_trip != TIMEOUT_SENTINEL).then_some(round_trip),
            status_message: status_message.into(),
            timeout_ms,
        }
    }

    pub fn measured(
        is_up: bool,
        elapsed: Duration,
        status_message: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            is_up,
            round_trip_ms: Some(clamp_round_trip(elapsed)),
            status_message: status_message.into(),
            timeout_ms,
        }
    }

    pub fn unmeasured(status_message: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            is_up: false,
            round_trip_ms: None,
            status_message: status_message.into(),
            timeout_ms,
        }
    }

    /// Outcome used when the bounded wait on a connector elapses.
    pub fn timed_out(descriptor: &ProbeDescriptor) -> Self {
        Self::unmeasured(
            status_line(
                descriptor.endpoint_type,
                Verdict::Timeout,
                &format!("Timed out after {} ms", descriptor.timeout_ms),
            ),
            descriptor.timeout_ms,
        )
    }
}

/// Millisecond round trip, kept strictly below the sentinel.
pub fn clamp_round_trip(elapsed: Duration) -> u16 {
    u16::try_from(elapsed.as_millis())
        .unwrap_or(TIMEOUT_SENTINEL - 1)
        .min(TIMEOUT_SENTINEL - 1)
}

/// Render `"<PREFIX>:<verdict>:<detail>"`. Colons inside `detail` are dropped
/// so that consumers splitting on `:` see the detail as a single segment.
pub fn status_line(endpoint_type: EndpointType, verdict: Verdict, detail: &str) -> String {
    format!(
        "{}:{}:{}",
        endpoint_type.status_prefix(),
        verdict,
        strip_colons(detail)
    )
}

pub fn strip_colons(detail: &str) -> String {
    detail
        .replace("://", " ")
        .replace(':', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(endpoint_type: EndpointType, port: Option<u16>) -> ProbeDescriptor {
        ProbeDescriptor {
            address: "example.com".to_string(),
            port,
            endpoint_type,
            timeout_ms: 20000,
        }
    }

    #[test]
    fn test_sentinel_round_trip_is_unmeasured() {
        let outcome = ProbeOutcome::from_raw_round_trip(false, u16::MAX, "x:y:z", 20000);
        assert_eq!(outcome.round_trip_ms, None);

        let outcome = ProbeOutcome::from_raw_round_trip(true, 42, "x:y:z", 20000);
        assert_eq!(outcome.round_trip_ms, Some(42));
    }

    #[test]
    fn test_clamp_never_produces_sentinel() {
        assert_eq!(clamp_round_trip(Duration::from_millis(12)), 12);
        assert_eq!(
            clamp_round_trip(Duration::from_secs(3600)),
            TIMEOUT_SENTINEL - 1
        );
    }

    #[test]
    fn test_status_line_keeps_detail_in_one_segment() {
        let line = status_line(
            EndpointType::Http,
            Verdict::Failure,
            "error sending request for url (http://example.com:8080/)",
        );
        assert_eq!(line.split(':').count(), 3);
        assert!(line.starts_with("HTTP:Failure:error sending request"));
    }

    #[test]
    fn test_effective_port_defaults() {
        assert_eq!(descriptor(EndpointType::Http, None).effective_port(), Some(80));
        assert_eq!(descriptor(EndpointType::Https, None).effective_port(), Some(443));
        assert_eq!(descriptor(EndpointType::Smtp, None).effective_port(), Some(25));
        assert_eq!(descriptor(EndpointType::Dns, Some(53)).effective_port(), None);
        assert_eq!(
            descriptor(EndpointType::RawConnect, Some(22)).effective_port(),
            Some(22)
        );
    }

    #[test]
    fn test_timed_out_outcome_echoes_timeout() {
        let outcome = ProbeOutcome::timed_out(&descriptor(EndpointType::Icmp, None));
        assert!(!outcome.is_up);
        assert_eq!(outcome.round_trip_ms, None);
        assert_eq!(outcome.timeout_ms, 20000);
        assert_eq!(outcome.status_message, "ICMP:Timeout:Timed out after 20000 ms");
    }
}
