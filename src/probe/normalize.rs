//! Turns public request shapes into [`ProbeDescriptor`]s.
//!
//! Pure: no I/O, no logging. Every validation failure surfaces here, before a
//! connector is ever acquired.

use std::net::IpAddr;

use url::{Host, Url};

use super::request::{HostRequest, ProbeRequest, UrlRequest};
use super::{EndpointType, ProbeDescriptor};
use crate::config::model::TimeoutConfig;
use crate::errors::ValidationError;

const SMTP_DEFAULT_PORT: u16 = 25;

pub fn normalize(
    request: &ProbeRequest,
    timeouts: &TimeoutConfig,
) -> Result<ProbeDescriptor, ValidationError> {
    let endpoint_type = request.endpoint_type();
    match request {
        ProbeRequest::Icmp(host) | ProbeRequest::Dns(host) => Ok(ProbeDescriptor {
            address: parse_host(endpoint_type, &host.address)?,
            port: None,
            endpoint_type,
            timeout_ms: resolve_timeout(host.timeout_ms, endpoint_type, timeouts),
        }),
        ProbeRequest::Smtp(host) => Ok(ProbeDescriptor {
            address: parse_host(endpoint_type, &host.address)?,
            port: Some(non_zero(host.port).unwrap_or(SMTP_DEFAULT_PORT)),
            endpoint_type,
            timeout_ms: resolve_timeout(host.timeout_ms, endpoint_type, timeouts),
        }),
        ProbeRequest::Http(host) | ProbeRequest::Https(host) => {
            normalize_web(endpoint_type, host, timeouts)
        }
        ProbeRequest::RawConnect(host) | ProbeRequest::NmapProbe(host) => Ok(ProbeDescriptor {
            address: parse_host(endpoint_type, &host.address)?,
            port: Some(non_zero(host.port).ok_or(ValidationError::MissingPort(endpoint_type))?),
            endpoint_type,
            timeout_ms: resolve_timeout(host.timeout_ms, endpoint_type, timeouts),
        }),
        ProbeRequest::CrawlSite(host) => normalize_crawl(host, timeouts),
        ProbeRequest::Quantum(url) => normalize_quantum(url, timeouts),
    }
}

fn non_zero(port: Option<u16>) -> Option<u16> {
    port.filter(|p| *p != 0)
}

fn resolve_timeout(
    requested: Option<u64>,
    endpoint_type: EndpointType,
    timeouts: &TimeoutConfig,
) -> u64 {
    requested
        .filter(|t| *t > 0)
        .unwrap_or_else(|| timeouts.for_endpoint(endpoint_type))
        .max(1)
}

fn malformed(endpoint_type: EndpointType, address: &str, reason: impl ToString) -> ValidationError {
    ValidationError::MalformedAddress {
        endpoint_type,
        address: address.to_string(),
        reason: reason.to_string(),
    }
}

/// Accept a bare host name or IP literal (IPv6 with or without brackets).
fn parse_host(endpoint_type: EndpointType, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyAddress(endpoint_type));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(malformed(endpoint_type, trimmed, "contains whitespace"));
    }
    if trimmed.parse::<IpAddr>().is_ok() {
        return Ok(trimmed.to_string());
    }
    if trimmed.starts_with('-') {
        return Err(malformed(endpoint_type, trimmed, "must not start with '-'"));
    }
    if trimmed.contains('/') {
        return Err(malformed(endpoint_type, trimmed, "expected a host name, not a URL"));
    }
    match Host::parse(trimmed).map_err(|e| malformed(endpoint_type, trimmed, e))? {
        Host::Ipv6(ip) => Ok(ip.to_string()),
        _ => Ok(trimmed.to_string()),
    }
}

fn scheme_default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Parse `raw` as a URL, prefixing `default_scheme` when the caller gave a bare host.
fn parse_url(
    endpoint_type: EndpointType,
    raw: &str,
    default_scheme: &str,
) -> Result<(Url, bool), ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyAddress(endpoint_type));
    }
    let explicit_scheme = trimmed.contains("://");
    let candidate = if explicit_scheme {
        trimmed.to_string()
    } else {
        format!("{default_scheme}://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|e| malformed(endpoint_type, trimmed, e))?;
    if scheme_default_port(url.scheme()).is_none() {
        return Err(ValidationError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(malformed(endpoint_type, trimmed, "missing host"));
    }
    Ok((url, explicit_scheme))
}

/// Strip the port from `url` and return the one the probe should carry.
///
/// A port equal to the scheme default is reported as `None` so the engine
/// infers it from the scheme exactly once.
fn split_port(url: &mut Url, requested: Option<u16>) -> Option<u16> {
    let default = scheme_default_port(url.scheme());
    let port = non_zero(requested).or(url.port());
    // Only fails for cannot-be-a-base URLs, which parse_url never returns.
    let _ = url.set_port(None);
    port.filter(|p| Some(*p) != default)
}

fn normalize_web(
    endpoint_type: EndpointType,
    host: &HostRequest,
    timeouts: &TimeoutConfig,
) -> Result<ProbeDescriptor, ValidationError> {
    let (mut url, _) = parse_url(endpoint_type, &host.address, endpoint_type.as_str())?;
    let endpoint_type = match url.scheme() {
        "https" => EndpointType::Https,
        _ => EndpointType::Http,
    };
    let port = split_port(&mut url, host.port);

    Ok(ProbeDescriptor {
        address: url.to_string(),
        port,
        endpoint_type,
        timeout_ms: resolve_timeout(host.timeout_ms, endpoint_type, timeouts),
    })
}

fn normalize_crawl(
    host: &HostRequest,
    timeouts: &TimeoutConfig,
) -> Result<ProbeDescriptor, ValidationError> {
    let endpoint_type = EndpointType::CrawlSite;
    let (mut url, explicit_scheme) = parse_url(endpoint_type, &host.address, "https")?;
    let port = non_zero(host.port).or(url.port()).or_else(|| {
        // A caller who spelled out the scheme has chosen its port too.
        explicit_scheme
            .then(|| scheme_default_port(url.scheme()))
            .flatten()
    });
    let port = port.ok_or(ValidationError::MissingPort(endpoint_type))?;
    let _ = url.set_port(None);

    Ok(ProbeDescriptor {
        address: url.to_string(),
        port: Some(port),
        endpoint_type,
        timeout_ms: resolve_timeout(host.timeout_ms, endpoint_type, timeouts),
    })
}

fn normalize_quantum(
    request: &UrlRequest,
    timeouts: &TimeoutConfig,
) -> Result<ProbeDescriptor, ValidationError> {
    let endpoint_type = EndpointType::Quantum;
    let (mut url, _) = parse_url(endpoint_type, &request.url, "https")?;
    let port = non_zero(request.port).or(url.port());
    let _ = url.set_port(None);

    Ok(ProbeDescriptor {
        address: url.to_string(),
        port: port.filter(|p| *p != 443),
        endpoint_type,
        timeout_ms: resolve_timeout(None, endpoint_type, timeouts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeouts() -> TimeoutConfig {
        TimeoutConfig::default()
    }

    fn host(address: &str) -> HostRequest {
        HostRequest::new(address)
    }

    #[test]
    fn test_smtp_defaults_to_port_25() {
        let descriptor = normalize(&ProbeRequest::Smtp(host("smtp.gmail.com")), &timeouts())
            .expect("valid smtp request");
        assert_eq!(descriptor.port, Some(25));
        assert_eq!(descriptor.timeout_ms, 20000);

        let descriptor = normalize(
            &ProbeRequest::Smtp(host("smtp.gmail.com").with_port(0)),
            &timeouts(),
        )
        .expect("valid smtp request");
        assert_eq!(descriptor.port, Some(25));

        let descriptor = normalize(
            &ProbeRequest::Smtp(host("smtp.gmail.com").with_port(587)),
            &timeouts(),
        )
        .expect("valid smtp request");
        assert_eq!(descriptor.port, Some(587));
    }

    #[test]
    fn test_http_bare_host_leaves_port_unset() {
        let descriptor = normalize(&ProbeRequest::Http(host("example.com")), &timeouts())
            .expect("valid http request");
        assert_eq!(descriptor.endpoint_type, EndpointType::Http);
        assert_eq!(descriptor.address, "http://example.com/");
        assert_eq!(descriptor.port, None);
    }

    #[test]
    fn test_http_scheme_default_port_is_suppressed() {
        for (address, port) in [
            ("http://example.com:80", None),
            ("https://example.com:443/status", None),
            ("https://example.com", Some(443)),
            ("http://example.com", Some(80)),
        ] {
            let mut request = host(address);
            request.port = port;
            let descriptor =
                normalize(&ProbeRequest::Http(request), &timeouts()).expect("valid http request");
            assert_eq!(descriptor.port, None, "{address}");
            assert!(!descriptor.address.contains(":80"), "{address}");
            assert!(!descriptor.address.contains(":443"), "{address}");
        }
    }

    #[test]
    fn test_http_explicit_non_default_port_is_kept() {
        let descriptor = normalize(
            &ProbeRequest::Http(host("http://example.com:8080/health")),
            &timeouts(),
        )
        .expect("valid http request");
        assert_eq!(descriptor.port, Some(8080));
        assert_eq!(descriptor.address, "http://example.com/health");

        let descriptor = normalize(
            &ProbeRequest::Http(host("example.com").with_port(8443)),
            &timeouts(),
        )
        .expect("valid http request");
        assert_eq!(descriptor.port, Some(8443));
    }

    #[test]
    fn test_https_url_upgrades_endpoint_type() {
        let descriptor = normalize(
            &ProbeRequest::Http(host("https://www.cloudflare.com")),
            &timeouts(),
        )
        .expect("valid http request");
        assert_eq!(descriptor.endpoint_type, EndpointType::Https);

        let descriptor = normalize(&ProbeRequest::Https(host("cloudflare.com")), &timeouts())
            .expect("valid https request");
        assert_eq!(descriptor.address, "https://cloudflare.com/");
    }

    #[test]
    fn test_http_request_timeout_wins() {
        let descriptor = normalize(
            &ProbeRequest::Http(host("example.com").with_timeout_ms(5000)),
            &timeouts(),
        )
        .expect("valid http request");
        assert_eq!(descriptor.timeout_ms, 5000);

        let descriptor = normalize(
            &ProbeRequest::Http(host("example.com").with_timeout_ms(0)),
            &timeouts(),
        )
        .expect("valid http request");
        assert_eq!(descriptor.timeout_ms, 20000);
    }

    #[test]
    fn test_dns_and_icmp_ignore_port() {
        let descriptor = normalize(
            &ProbeRequest::Dns(host("google.com").with_port(53)),
            &timeouts(),
        )
        .expect("valid dns request");
        assert_eq!(descriptor.port, None);
        assert_eq!(descriptor.timeout_ms, 20000);

        let descriptor = normalize(&ProbeRequest::Icmp(host("2606:4700::1111")), &timeouts())
            .expect("valid icmp request");
        assert_eq!(descriptor.port, None);
        assert_eq!(descriptor.address, "2606:4700::1111");

        let descriptor = normalize(&ProbeRequest::Icmp(host("[2606:4700::1111]")), &timeouts())
            .expect("valid icmp request");
        assert_eq!(descriptor.address, "2606:4700::1111");
    }

    #[test]
    fn test_quantum_defaults() {
        let descriptor = normalize(
            &ProbeRequest::Quantum(UrlRequest {
                url: "https://cloudflare.com".to_string(),
                port: None,
            }),
            &timeouts(),
        )
        .expect("valid quantum request");
        assert_eq!(descriptor.endpoint_type, EndpointType::Quantum);
        assert_eq!(descriptor.timeout_ms, 20000);
        assert_eq!(descriptor.port, None);

        let descriptor = normalize(
            &ProbeRequest::Quantum(UrlRequest {
                url: "cloudflare.com".to_string(),
                port: Some(8443),
            }),
            &timeouts(),
        )
        .expect("valid quantum request");
        assert_eq!(descriptor.address, "https://cloudflare.com/");
        assert_eq!(descriptor.port, Some(8443));
    }

    #[test]
    fn test_port_required_for_connect_probes() {
        for request in [
            ProbeRequest::RawConnect(host("10.0.0.1")),
            ProbeRequest::NmapProbe(host("10.0.0.1").with_port(0)),
            ProbeRequest::CrawlSite(host("example.com")),
        ] {
            let endpoint_type = request.endpoint_type();
            assert_eq!(
                normalize(&request, &timeouts()),
                Err(ValidationError::MissingPort(endpoint_type))
            );
        }

        let descriptor = normalize(
            &ProbeRequest::RawConnect(host("10.0.0.1").with_port(22)),
            &timeouts(),
        )
        .expect("valid rawconnect request");
        assert_eq!(descriptor.port, Some(22));

        let descriptor = normalize(
            &ProbeRequest::CrawlSite(host("https://example.com")),
            &timeouts(),
        )
        .expect("valid crawl request");
        assert_eq!(descriptor.port, Some(443));
    }

    #[test]
    fn test_empty_and_malformed_addresses() {
        assert_eq!(
            normalize(&ProbeRequest::Icmp(host("   ")), &timeouts()),
            Err(ValidationError::EmptyAddress(EndpointType::Icmp))
        );
        assert!(matches!(
            normalize(&ProbeRequest::Dns(host("bad host")), &timeouts()),
            Err(ValidationError::MalformedAddress { .. })
        ));
        assert!(matches!(
            normalize(&ProbeRequest::Smtp(host("http://mail.example.com")), &timeouts()),
            Err(ValidationError::MalformedAddress { .. })
        ));
        assert_eq!(
            normalize(&ProbeRequest::Http(host("ftp://example.com")), &timeouts()),
            Err(ValidationError::UnsupportedScheme("ftp".to_string()))
        );
        assert_eq!(
            normalize(
                &ProbeRequest::Quantum(UrlRequest::default()),
                &timeouts()
            ),
            Err(ValidationError::EmptyAddress(EndpointType::Quantum))
        );
    }
}
