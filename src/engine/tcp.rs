use std::io::ErrorKind;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{Connector, truncate_detail};
use crate::errors::EngineFault;
use crate::probe::{EndpointType, ProbeDescriptor, ProbeOutcome, Verdict, status_line};

/// Upper bound on the banner read after a port probe connects.
const BANNER_WAIT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Plain connect, reports connect time.
    Raw,
    /// Port state plus whatever the service announces.
    PortProbe,
}

pub struct TcpConnector {
    descriptor: ProbeDescriptor,
    mode: Mode,
}

impl TcpConnector {
    pub fn raw(descriptor: ProbeDescriptor) -> Self {
        Self {
            descriptor,
            mode: Mode::Raw,
        }
    }

    pub fn port_probe(descriptor: ProbeDescriptor) -> Self {
        Self {
            descriptor,
            mode: Mode::PortProbe,
        }
    }
}

/// Bytes sent to coax a banner out of services that wait for the client.
fn banner_probe(port: u16) -> &'static [u8] {
    match port {
        80 | 8000 | 8080 | 8888 => b"HEAD / HTTP/1.0\r\n\r\n",
        _ => b"\r\n",
    }
}

async fn grab_banner(stream: &mut TcpStream, port: u16) -> Option<String> {
    let mut buffer = [0u8; 512];
    // Services that speak first (ssh, smtp, ftp) answer without a nudge.
    let n = match tokio::time::timeout(BANNER_WAIT, stream.read(&mut buffer)).await {
        Ok(Ok(n)) if n > 0 => n,
        _ => {
            stream.write_all(banner_probe(port)).await.ok()?;
            match tokio::time::timeout(BANNER_WAIT, stream.read(&mut buffer)).await {
                Ok(Ok(n)) if n > 0 => n,
                _ => return None,
            }
        }
    };
    let banner = truncate_detail(String::from_utf8_lossy(&buffer[..n]).trim());
    (!banner.is_empty()).then_some(banner)
}

#[async_trait]
impl Connector for TcpConnector {
    async fn run(self: Box<Self>) -> Result<ProbeOutcome, EngineFault> {
        let descriptor = &self.descriptor;
        let endpoint_type = descriptor.endpoint_type;
        let port = descriptor.port.ok_or_else(|| {
            EngineFault::InvalidDescriptor(format!("{endpoint_type} probe without a port"))
        })?;

        let start = Instant::now();
        let connect = tokio::time::timeout(
            descriptor.timeout(),
            TcpStream::connect((descriptor.address.as_str(), port)),
        )
        .await;
        let elapsed = start.elapsed();

        let mut stream = match (connect, self.mode) {
            (Err(_), Mode::Raw) => return Ok(ProbeOutcome::timed_out(descriptor)),
            (Err(_), Mode::PortProbe) => {
                return Ok(ProbeOutcome::unmeasured(
                    status_line(endpoint_type, Verdict::Timeout, &format!("Port {port} filtered")),
                    descriptor.timeout_ms,
                ));
            }
            (Ok(Err(e)), Mode::PortProbe) if e.kind() == ErrorKind::ConnectionRefused => {
                return Ok(ProbeOutcome::unmeasured(
                    status_line(endpoint_type, Verdict::Failure, &format!("Port {port} closed")),
                    descriptor.timeout_ms,
                ));
            }
            (Ok(Err(e)), _) => {
                return Ok(ProbeOutcome::unmeasured(
                    status_line(endpoint_type, Verdict::Failure, &truncate_detail(&e.to_string())),
                    descriptor.timeout_ms,
                ));
            }
            (Ok(Ok(stream)), _) => stream,
        };

        let detail = match self.mode {
            Mode::Raw => format!("Connected to {} port {port}", descriptor.address),
            Mode::PortProbe => match grab_banner(&mut stream, port).await {
                Some(banner) => format!("Port {port} open, {banner}"),
                None => format!("Port {port} open"),
            },
        };

        Ok(ProbeOutcome::measured(
            true,
            elapsed,
            status_line(endpoint_type, Verdict::Success, &detail),
            descriptor.timeout_ms,
        ))
    }
}
