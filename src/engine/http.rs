use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tokio_native_tls::TlsConnector as TokioTlsConnector;

use super::tls::cert_validity_days;
use super::{Connector, connect_host, parse_descriptor_url};
use crate::config::app_config::setup_tls_connector;
use crate::errors::{EngineFault, report};
use crate::probe::{EndpointType, ProbeDescriptor, ProbeOutcome, Verdict, status_line};

const USER_AGENT: &str = "netprobe/1.0";

/// A client that never reuses connections or goes through a proxy, so every
/// request pays (and measures) its own connect and handshake.
pub(crate) fn probe_client(timeout: Duration) -> Result<Client, EngineFault> {
    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(true)
        .pool_max_idle_per_host(0)
        .no_proxy()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| EngineFault::Resource(report(&e)))
}

/// `"<code> <reason>"`, e.g. `"200 OK"`.
pub(crate) fn describe_status(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

pub(crate) fn describe_error(err: reqwest::Error) -> String {
    super::truncate_detail(&report(&err.without_url()))
}

pub struct HttpConnector {
    descriptor: ProbeDescriptor,
    client: Client,
    tls: Option<TokioTlsConnector>,
}

impl HttpConnector {
    pub fn new(descriptor: ProbeDescriptor) -> Result<Self, EngineFault> {
        let client = probe_client(descriptor.timeout())?;
        let tls = match descriptor.endpoint_type {
            EndpointType::Https => {
                Some(setup_tls_connector().map_err(|e| EngineFault::Resource(report(&e)))?)
            }
            _ => None,
        };
        Ok(Self {
            descriptor,
            client,
            tls,
        })
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn run(self: Box<Self>) -> Result<ProbeOutcome, EngineFault> {
        let descriptor = &self.descriptor;
        let endpoint_type = descriptor.endpoint_type;
        let mut url = parse_descriptor_url(descriptor)?;
        if let Some(port) = descriptor.port {
            url.set_port(Some(port)).map_err(|_| {
                EngineFault::InvalidDescriptor(format!("cannot set port on '{url}'"))
            })?;
        }

        let start = Instant::now();
        let response = self.client.get(url.clone()).send().await;
        let elapsed = start.elapsed();

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Ok(ProbeOutcome::unmeasured(
                    status_line(endpoint_type, Verdict::Timeout, "Request timed out"),
                    descriptor.timeout_ms,
                ));
            }
            Err(e) => {
                return Ok(ProbeOutcome::unmeasured(
                    status_line(endpoint_type, Verdict::Failure, &describe_error(e)),
                    descriptor.timeout_ms,
                ));
            }
        };

        let status = response.status();
        let is_up = status.is_success() || status.is_redirection();
        let mut detail = describe_status(status);

        if let (Some(tls), Some(host)) = (&self.tls, connect_host(&url)) {
            let port = url.port_or_known_default().unwrap_or(443);
            let remaining = descriptor.timeout().saturating_sub(elapsed);
            if let Ok(Some(days)) =
                tokio::time::timeout(remaining, cert_validity_days(&host, port, tls)).await
            {
                detail.push_str(&format!(", certificate expires in {days} days"));
            }
        }

        let verdict = if is_up { Verdict::Success } else { Verdict::Failure };
        Ok(ProbeOutcome::measured(
            is_up,
            elapsed,
            status_line(endpoint_type, verdict, &detail),
            descriptor.timeout_ms,
        ))
    }
}
