use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::{Connector, truncate_detail};
use crate::errors::EngineFault;
use crate::probe::{EndpointType, ProbeDescriptor, ProbeOutcome, Verdict, status_line};

const DEFAULT_SMTP_PORT: u16 = 25;
const HELO: &[u8] = b"HELO netprobe\r\n";
const QUIT: &[u8] = b"QUIT\r\n";

/// Greets an SMTP server: banner, `HELO`, `QUIT`.
pub struct SmtpConnector {
    descriptor: ProbeDescriptor,
}

impl SmtpConnector {
    pub fn new(descriptor: ProbeDescriptor) -> Self {
        Self { descriptor }
    }
}

/// Reply code and text of the first line. Continuation lines (`250-...`) are
/// consumed until the final line of the reply.
pub async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<(u16, String)> {
    let mut first: Option<(u16, String)> = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-reply",
            ));
        }
        let line = line.trim_end();
        let code = line
            .get(..3)
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("not an SMTP reply: {line}"),
                )
            })?;
        let more = line.as_bytes().get(3) == Some(&b'-');
        if first.is_none() {
            first = Some((code, line.get(4..).unwrap_or_default().to_string()));
        }
        if !more {
            return first.ok_or_else(|| std::io::Error::other("empty reply"));
        }
    }
}

enum Conversation {
    Accepted(String),
    Rejected(String),
}

async fn converse(host: &str, port: u16) -> std::io::Result<Conversation> {
    let stream = TcpStream::connect((host, port)).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let (code, banner) = read_reply(&mut reader).await?;
    if code != 220 {
        return Ok(Conversation::Rejected(format!("{code} {banner}")));
    }

    write_half.write_all(HELO).await?;
    let (code, text) = read_reply(&mut reader).await?;
    // Best effort; the verdict is already decided.
    let _ = write_half.write_all(QUIT).await;

    if code == 250 {
        Ok(Conversation::Accepted(banner))
    } else {
        Ok(Conversation::Rejected(format!("HELO refused {code} {text}")))
    }
}

#[async_trait]
impl Connector for SmtpConnector {
    async fn run(self: Box<Self>) -> Result<ProbeOutcome, EngineFault> {
        let descriptor = &self.descriptor;
        let port = descriptor.port.unwrap_or(DEFAULT_SMTP_PORT);

        let start = Instant::now();
        let conversation =
            tokio::time::timeout(descriptor.timeout(), converse(&descriptor.address, port)).await;
        let elapsed = start.elapsed();

        let outcome = match conversation {
            Err(_) => ProbeOutcome::timed_out(descriptor),
            Ok(Err(e)) => ProbeOutcome::unmeasured(
                status_line(EndpointType::Smtp, Verdict::Failure, &truncate_detail(&e.to_string())),
                descriptor.timeout_ms,
            ),
            Ok(Ok(Conversation::Accepted(banner))) => ProbeOutcome::measured(
                true,
                elapsed,
                status_line(EndpointType::Smtp, Verdict::Success, &truncate_detail(&banner)),
                descriptor.timeout_ms,
            ),
            Ok(Ok(Conversation::Rejected(reason))) => ProbeOutcome::measured(
                false,
                elapsed,
                status_line(EndpointType::Smtp, Verdict::Failure, &truncate_detail(&reason)),
                descriptor.timeout_ms,
            ),
        };
        Ok(outcome)
    }
}
