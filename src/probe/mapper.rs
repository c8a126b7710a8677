//! Maps a [`ProbeOutcome`] onto the public payloads.
//!
//! The engine's status line is `"<PREFIX>:<verdict>:<detail>[:<extra>]"`.
//! It is treated as low-trust text: a missing segment yields an empty field,
//! never an error.

use super::result::{CheckResult, QuantumCheckResult};
use super::{EndpointType, ProbeDescriptor, ProbeOutcome};

const DNS_RESOLVED_PREFIX: &str = "Resolved addresses : ";

/// Split the status line and return `(status, extra)`.
///
/// DNS keeps everything after the second colon as one segment so IPv6
/// addresses survive intact; every other family splits on each colon.
fn status_segments(endpoint_type: EndpointType, status_message: &str) -> (String, String) {
    let segments: Vec<&str> = match endpoint_type {
        EndpointType::Dns => status_message.splitn(3, ':').collect(),
        _ => status_message.split(':').collect(),
    };
    let segment = |index: usize| segments.get(index).copied().unwrap_or_default().to_string();
    (segment(2), segment(3))
}

/// `(responseTime, timeoutMs)`: exactly one of the two is set.
fn timing(descriptor: &ProbeDescriptor, outcome: &ProbeOutcome) -> (Option<u16>, Option<u64>) {
    match outcome.round_trip_ms {
        Some(rtt) => (Some(rtt), None),
        None => (None, Some(descriptor.timeout_ms)),
    }
}

pub fn check_result(
    descriptor: &ProbeDescriptor,
    outcome: &ProbeOutcome,
    setup_hint: &str,
) -> CheckResult {
    let (status, _) = status_segments(descriptor.endpoint_type, &outcome.status_message);
    let result_status = match descriptor.endpoint_type {
        EndpointType::Dns if outcome.is_up && !status.is_empty() => {
            format!("{DNS_RESOLVED_PREFIX}{status}")
        }
        _ => status,
    };
    let (response_time, timeout_ms) = timing(descriptor, outcome);

    CheckResult {
        tested_address: descriptor.address.clone(),
        tested_port: descriptor.effective_port(),
        result_success: outcome.is_up,
        result_status,
        response_time,
        timeout_ms,
        setup_monitor: setup_hint.to_string(),
    }
}

pub fn quantum_check_result(
    descriptor: &ProbeDescriptor,
    outcome: &ProbeOutcome,
    setup_hint: &str,
) -> QuantumCheckResult {
    let (result_status, quantum_key_exchange) =
        status_segments(descriptor.endpoint_type, &outcome.status_message);
    let (response_time, timeout_ms) = timing(descriptor, outcome);

    QuantumCheckResult {
        tested_url: descriptor.address.clone(),
        result_success: outcome.is_up,
        result_status,
        quantum_key_exchange,
        response_time,
        timeout_ms,
        setup_monitor: setup_hint.to_string(),
    }
}
