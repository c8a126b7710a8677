use std::time::Instant;

use async_trait::async_trait;
use trust_dns_resolver::TokioAsyncResolver;

use super::{Connector, truncate_detail};
use crate::errors::EngineFault;
use crate::probe::{EndpointType, ProbeDescriptor, ProbeOutcome, Verdict, status_line};

pub struct DnsConnector {
    descriptor: ProbeDescriptor,
    resolver: TokioAsyncResolver,
}

impl DnsConnector {
    pub fn new(descriptor: ProbeDescriptor, resolver: TokioAsyncResolver) -> Self {
        Self {
            descriptor,
            resolver,
        }
    }
}

/// DNS status lines keep the addresses verbatim (IPv6 colons included).
fn resolved_line(addresses: &[String]) -> String {
    format!(
        "{}:{}:{}",
        EndpointType::Dns.status_prefix(),
        Verdict::Success,
        addresses.join(", ")
    )
}

#[async_trait]
impl Connector for DnsConnector {
    async fn run(self: Box<Self>) -> Result<ProbeOutcome, EngineFault> {
        let descriptor = &self.descriptor;

        let start = Instant::now();
        let lookup = tokio::time::timeout(
            descriptor.timeout(),
            self.resolver.lookup_ip(descriptor.address.as_str()),
        )
        .await;
        let elapsed = start.elapsed();

        let outcome = match lookup {
            Err(_) => ProbeOutcome::timed_out(descriptor),
            Ok(Err(e)) => ProbeOutcome::unmeasured(
                status_line(
                    EndpointType::Dns,
                    Verdict::Failure,
                    &truncate_detail(&e.to_string()),
                ),
                descriptor.timeout_ms,
            ),
            Ok(Ok(lookup)) => {
                let addresses: Vec<String> = lookup.iter().map(|ip| ip.to_string()).collect();
                if addresses.is_empty() {
                    ProbeOutcome::measured(
                        false,
                        elapsed,
                        status_line(EndpointType::Dns, Verdict::Failure, "No addresses found"),
                        descriptor.timeout_ms,
                    )
                } else {
                    ProbeOutcome::measured(true, elapsed, resolved_line(&addresses), descriptor.timeout_ms)
                }
            }
        };
        Ok(outcome)
    }
}
