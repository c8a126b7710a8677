//! Connector engine.
//!
//! The core only sees [`ConnectorPool`] and [`Connector`]. [`EnginePool`] is
//! the built-in implementation; each `acquire` hands out a connector that owns
//! everything it needs (client, resolver, TLS config), so concurrent probes
//! never share connection pools, DNS caches or timing state.

pub mod crawl;
pub mod dns;
pub mod http;
pub mod icmp;
#[cfg(test)]
pub mod mock;
pub mod quantum;
pub mod smtp;
pub mod tcp;
pub mod tls;

use std::net::IpAddr;

use async_trait::async_trait;
use trust_dns_resolver::TokioAsyncResolver;
use unicode_truncate::UnicodeTruncateStr;
use url::{Host, Url};

use crate::config::AppConfig;
use crate::config::app_config::setup_resolver;
use crate::errors::{EngineFault, report};
use crate::probe::{EndpointType, ProbeDescriptor, ProbeOutcome};

/// Longest free-text detail (banner, error chain) carried in a status line.
pub const MAX_DETAIL_WIDTH: usize = 160;

/// A single-use probe. Consumed by [`Connector::run`].
#[async_trait]
pub trait Connector: Send {
    /// Execute the probe. Ordinary network failures are reported through the
    /// outcome (`is_up == false`); `Err` is reserved for engine faults.
    async fn run(self: Box<Self>) -> Result<ProbeOutcome, EngineFault>;
}

pub trait ConnectorPool: Send + Sync {
    fn acquire(&self, descriptor: &ProbeDescriptor) -> Result<Box<dyn Connector>, EngineFault>;
}

/// Built-in engine backed by real network I/O.
#[derive(Debug, Clone)]
pub struct EnginePool {
    dns_hosts: Vec<IpAddr>,
    crawl_max_pages: usize,
}

impl EnginePool {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            dns_hosts: config.dns_hosts.clone(),
            crawl_max_pages: config.service.crawl_max_pages.max(1),
        }
    }

    fn resolver(&self, descriptor: &ProbeDescriptor) -> Result<TokioAsyncResolver, EngineFault> {
        if self.dns_hosts.is_empty() {
            return TokioAsyncResolver::tokio_from_system_conf()
                .map_err(|e| EngineFault::Resource(report(&e)));
        }
        Ok(setup_resolver(&self.dns_hosts, descriptor.timeout()))
    }
}

impl ConnectorPool for EnginePool {
    fn acquire(&self, descriptor: &ProbeDescriptor) -> Result<Box<dyn Connector>, EngineFault> {
        if descriptor.address.trim().is_empty() {
            return Err(EngineFault::InvalidDescriptor("empty address".to_string()));
        }
        if descriptor.timeout_ms == 0 {
            return Err(EngineFault::InvalidDescriptor("zero timeout".to_string()));
        }
        if descriptor.address.starts_with('-') {
            return Err(EngineFault::InvalidDescriptor(format!(
                "address '{}' looks like an option",
                descriptor.address
            )));
        }

        let descriptor = descriptor.clone();
        let connector: Box<dyn Connector> = match descriptor.endpoint_type {
            EndpointType::Icmp => Box::new(icmp::IcmpConnector::new(descriptor)),
            EndpointType::Dns => {
                let resolver = self.resolver(&descriptor)?;
                Box::new(dns::DnsConnector::new(descriptor, resolver))
            }
            EndpointType::Http | EndpointType::Https => {
                Box::new(http::HttpConnector::new(descriptor)?)
            }
            EndpointType::Smtp => Box::new(smtp::SmtpConnector::new(descriptor)),
            EndpointType::RawConnect => Box::new(tcp::TcpConnector::raw(descriptor)),
            EndpointType::NmapProbe => Box::new(tcp::TcpConnector::port_probe(descriptor)),
            EndpointType::Quantum => Box::new(quantum::QuantumConnector::new(descriptor)?),
            EndpointType::CrawlSite => {
                Box::new(crawl::CrawlConnector::new(descriptor, self.crawl_max_pages)?)
            }
        };
        Ok(connector)
    }
}

/// Host part of a URL in the form socket APIs expect (IPv6 without brackets).
pub(crate) fn connect_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => Some(domain.to_string()),
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}

pub(crate) fn parse_descriptor_url(descriptor: &ProbeDescriptor) -> Result<Url, EngineFault> {
    Url::parse(&descriptor.address).map_err(|e| {
        EngineFault::InvalidDescriptor(format!("'{}' is not a URL: {e}", descriptor.address))
    })
}

/// Cut free text down to a single status-line friendly segment.
pub(crate) fn truncate_detail(input: &str) -> String {
    let single_line = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let (truncated, _) = single_line.unicode_truncate(MAX_DETAIL_WIDTH);
    truncated.to_string()
}
