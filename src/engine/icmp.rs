use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Connector, truncate_detail};
use crate::errors::EngineFault;
use crate::probe::{
    EndpointType, ProbeDescriptor, ProbeOutcome, TIMEOUT_SENTINEL, Verdict, clamp_round_trip,
    status_line,
};

/// Single echo request through the system `ping` binary.
pub struct IcmpConnector {
    descriptor: ProbeDescriptor,
}

impl IcmpConnector {
    pub fn new(descriptor: ProbeDescriptor) -> Self {
        Self { descriptor }
    }

    fn command(&self) -> Command {
        let descriptor = &self.descriptor;
        let mut cmd = Command::new("ping");
        if cfg!(windows) {
            cmd.args(["-n", "1", "-w", &descriptor.timeout_ms.to_string()]);
        } else {
            let seconds = descriptor.timeout_ms.div_ceil(1000).max(1);
            cmd.args(["-c", "1", "-W", &seconds.to_string()]);
        }
        cmd.arg(&descriptor.address)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Round trip reported by ping, e.g. `time=12.4 ms` or `time<1ms`.
pub fn parse_ping_time(output: &str) -> Option<u16> {
    let index = output.find("time=").or_else(|| output.find("time<"))?;
    let digits: String = output[index + 5..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let millis: f64 = digits.parse().ok()?;
    Some((millis.round() as u64).clamp(1, u64::from(TIMEOUT_SENTINEL - 1)) as u16)
}

/// Why ping gave up. A lost reply leaves stderr empty; resolver, permission
/// and argument errors are reported there.
fn failure_detail(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(truncate_detail)
        .unwrap_or_else(|| "Request timed out".to_string())
}

#[async_trait]
impl Connector for IcmpConnector {
    async fn run(self: Box<Self>) -> Result<ProbeOutcome, EngineFault> {
        let descriptor = &self.descriptor;
        let start = Instant::now();
        let output = match tokio::time::timeout(descriptor.timeout(), self.command().output()).await
        {
            Err(_) => return Ok(ProbeOutcome::timed_out(descriptor)),
            Ok(Err(e)) => {
                return Err(EngineFault::Resource(format!("failed to run ping: {e}")));
            }
            Ok(Ok(output)) => output,
        };
        let elapsed = start.elapsed();

        if !output.status.success() {
            return Ok(ProbeOutcome::unmeasured(
                status_line(
                    EndpointType::Icmp,
                    Verdict::Failure,
                    &failure_detail(&output.stderr),
                ),
                descriptor.timeout_ms,
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let rtt = parse_ping_time(&stdout).unwrap_or_else(|| clamp_round_trip(elapsed));
        Ok(ProbeOutcome {
            is_up: true,
            round_trip_ms: Some(rtt),
            status_message: status_line(
                EndpointType::Icmp,
                Verdict::Success,
                &format!("Reply from {} time={}ms", descriptor.address, rtt),
            ),
            timeout_ms: descriptor.timeout_ms,
        })
    }
}
