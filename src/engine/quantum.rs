use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use super::tls::{is_post_quantum_group, post_quantum_client_config};
use super::{Connector, connect_host, parse_descriptor_url, truncate_detail};
use crate::errors::{EngineFault, report};
use crate::probe::{EndpointType, ProbeDescriptor, ProbeOutcome, Verdict, status_line, strip_colons};

const DEFAULT_TLS_PORT: u16 = 443;

/// Performs a TLS handshake offering a hybrid post-quantum group and reports
/// which key exchange the server picked.
pub struct QuantumConnector {
    descriptor: ProbeDescriptor,
    connector: TlsConnector,
}

impl QuantumConnector {
    pub fn new(descriptor: ProbeDescriptor) -> Result<Self, EngineFault> {
        let config = post_quantum_client_config().map_err(|e| EngineFault::Resource(report(&e)))?;
        Ok(Self {
            descriptor,
            connector: TlsConnector::from(Arc::new(config)),
        })
    }
}

/// `"QUANTUM:<verdict>:<status>:<group>"`; the group lands in the fourth segment.
fn quantum_status_line(verdict: Verdict, status: &str, group: &str) -> String {
    format!(
        "{}:{}",
        status_line(EndpointType::Quantum, verdict, status),
        strip_colons(group)
    )
}

#[async_trait]
impl Connector for QuantumConnector {
    async fn run(self: Box<Self>) -> Result<ProbeOutcome, EngineFault> {
        let descriptor = &self.descriptor;
        let url = parse_descriptor_url(descriptor)?;
        let host = connect_host(&url).ok_or_else(|| {
            EngineFault::InvalidDescriptor(format!("'{}' has no host", descriptor.address))
        })?;
        let port = descriptor.port.unwrap_or(DEFAULT_TLS_PORT);
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| EngineFault::InvalidDescriptor(format!("invalid server name: {e}")))?;

        let start = Instant::now();
        let handshake = async {
            let stream = TcpStream::connect((host.as_str(), port)).await?;
            self.connector.connect(server_name, stream).await
        };

        let stream = match tokio::time::timeout(descriptor.timeout(), handshake).await {
            Err(_) => return Ok(ProbeOutcome::timed_out(descriptor)),
            Ok(Err(e)) => {
                return Ok(ProbeOutcome::unmeasured(
                    status_line(
                        EndpointType::Quantum,
                        Verdict::Failure,
                        &format!("Handshake failed {}", truncate_detail(&report(&e))),
                    ),
                    descriptor.timeout_ms,
                ));
            }
            Ok(Ok(stream)) => stream,
        };
        let elapsed = start.elapsed();

        let group = stream
            .get_ref()
            .1
            .negotiated_key_exchange_group()
            .map(|group| format!("{:?}", group.name()));

        let outcome = match group {
            Some(name) if is_post_quantum_group(&name) => ProbeOutcome::measured(
                true,
                elapsed,
                quantum_status_line(Verdict::Success, "Quantum safe key exchange", &name),
                descriptor.timeout_ms,
            ),
            Some(name) => ProbeOutcome::measured(
                false,
                elapsed,
                quantum_status_line(Verdict::Failure, "Key exchange is not quantum safe", &name),
                descriptor.timeout_ms,
            ),
            None => ProbeOutcome::measured(
                false,
                elapsed,
                status_line(
                    EndpointType::Quantum,
                    Verdict::Failure,
                    "Key exchange could not be determined",
                ),
                descriptor.timeout_ms,
            ),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_lands_in_fourth_segment() {
        let line = quantum_status_line(
            Verdict::Success,
            "Quantum safe key exchange",
            "X25519MLKEM768",
        );
        let segments: Vec<&str> = line.split(':').collect();
        assert_eq!(
            segments,
            vec!["QUANTUM", "Success", "Quantum safe key exchange", "X25519MLKEM768"]
        );
    }

    #[tokio::test]
    async fn test_refused_handshake_is_a_failed_outcome() {
        let descriptor = ProbeDescriptor {
            address: "https://127.0.0.1/".to_string(),
            port: Some(9),
            endpoint_type: EndpointType::Quantum,
            timeout_ms: 2000,
        };
        let outcome = Box::new(QuantumConnector::new(descriptor).expect("config builds"))
            .run()
            .await
            .expect("no engine fault");
        assert!(!outcome.is_up);
        assert!(outcome.status_message.starts_with("QUANTUM:"));
    }
}
