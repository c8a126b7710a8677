//! Check pipeline: normalize, acquire, bounded run, map.
//!
//! Every failure past authorization is absorbed into the returned
//! [`ResultEnvelope`]; nothing here returns an error to the transport.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info};

use crate::config::{ServiceConfig, TimeoutConfig};
use crate::engine::{Connector, ConnectorPool};
use crate::errors::{CheckError, EngineFault, report};
use crate::probe::prelude::*;

pub struct CheckService {
    pool: Arc<dyn ConnectorPool>,
    timeouts: TimeoutConfig,
    front_end_url: String,
}

impl CheckService {
    pub fn new(pool: Arc<dyn ConnectorPool>, config: &ServiceConfig) -> Self {
        Self {
            pool,
            timeouts: config.timeouts.clone(),
            front_end_url: config.front_end_url.clone(),
        }
    }

    /// Run any non-quantum check.
    pub async fn check(&self, request: ProbeRequest) -> ResultEnvelope<CheckResult> {
        let hint = format!("To setup a service monitor visit : {}", self.front_end_url);
        self.execute(request, |descriptor, outcome| {
            check_result(descriptor, outcome, &hint)
        })
        .await
    }

    pub async fn check_quantum(&self, request: UrlRequest) -> ResultEnvelope<QuantumCheckResult> {
        let hint = format!(
            "To setup a quantum ready monitor visit : {}",
            self.front_end_url
        );
        self.execute(ProbeRequest::Quantum(request), |descriptor, outcome| {
            quantum_check_result(descriptor, outcome, &hint)
        })
        .await
    }

    async fn execute<T, F>(&self, request: ProbeRequest, map: F) -> ResultEnvelope<T>
    where
        F: FnOnce(&ProbeDescriptor, &ProbeOutcome) -> T,
    {
        let operation = request.operation();
        let mut envelope = ResultEnvelope::started(format!("SERVICE : {operation} :"));

        match self.dispatch(&request).await {
            Ok((descriptor, outcome)) => {
                info!(
                    operation,
                    address = %descriptor.address,
                    is_up = outcome.is_up,
                    round_trip_ms = ?outcome.round_trip_ms,
                    "check complete"
                );
                let data = map(&descriptor, &outcome);
                envelope.complete(&outcome.status_message, data);
            }
            Err(e) => {
                let kind = match e {
                    CheckError::Validation(_) => FailureKind::Validation,
                    CheckError::Engine(_) => FailureKind::Engine,
                };
                let detail = report(&e);
                error!(operation, "check failed: {detail}");
                envelope.fail(kind, &detail);
            }
        }
        envelope
    }

    async fn dispatch(
        &self,
        request: &ProbeRequest,
    ) -> Result<(ProbeDescriptor, ProbeOutcome), CheckError> {
        let descriptor = normalize(request, &self.timeouts)?;
        let connector = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.acquire(&descriptor)
        }))
        .map_err(|payload| EngineFault::Panicked(panic_message(payload.as_ref())))??;
        let outcome = run_bounded(connector, &descriptor).await?;
        Ok((descriptor, outcome))
    }
}

/// Await the connector for at most the descriptor timeout. A panic inside the
/// connector becomes [`EngineFault::Panicked`]; an elapsed bound becomes a
/// timed-out outcome.
async fn run_bounded(
    connector: Box<dyn Connector>,
    descriptor: &ProbeDescriptor,
) -> Result<ProbeOutcome, EngineFault> {
    let run = AssertUnwindSafe(connector.run()).catch_unwind();
    match tokio::time::timeout(descriptor.timeout(), run).await {
        Err(_) => Ok(ProbeOutcome::timed_out(descriptor)),
        Ok(Err(payload)) => Err(EngineFault::Panicked(panic_message(payload.as_ref()))),
        Ok(Ok(result)) => result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{Script, ScriptedPool};

    fn service(script: Script) -> (CheckService, Arc<ScriptedPool>) {
        let pool = Arc::new(ScriptedPool::new(script));
        let config = ServiceConfig {
            front_end_url: "https://monitor.example".to_string(),
            ..Default::default()
        };
        (CheckService::new(pool.clone(), &config), pool)
    }

    fn host(address: &str) -> HostRequest {
        HostRequest::new(address)
    }

    #[tokio::test]
    async fn test_scenario_http_success() {
        let (service, _) = service(Script::outcome(true, 42, "SERVICE:CheckHttp:200 OK"));
        let envelope = service
            .check(ProbeRequest::Http(host("http://example.com")))
            .await;

        assert!(envelope.success);
        assert_eq!(
            envelope.message,
            "SERVICE : CheckHttp : SERVICE:CheckHttp:200 OK"
        );
        let data = envelope.data.expect("data present");
        assert!(data.result_success);
        assert_eq!(data.response_time, Some(42));
        assert_eq!(data.timeout_ms, None);
        assert_eq!(data.result_status, "200 OK");
        assert_eq!(data.tested_port, Some(80));
        assert_eq!(
            data.setup_monitor,
            "To setup a service monitor visit : https://monitor.example"
        );
    }

    #[tokio::test]
    async fn test_scenario_icmp_timeout() {
        let (service, _) = service(Script::outcome(
            false,
            u16::MAX,
            "SERVICE:CheckIcmp:Request timed out",
        ));
        let envelope = service.check(ProbeRequest::Icmp(host("10.0.0.1"))).await;

        assert!(envelope.success);
        let data = envelope.data.expect("data present");
        assert!(!data.result_success);
        assert_eq!(data.response_time, None);
        assert_eq!(data.timeout_ms, Some(20000));
        assert_eq!(data.result_status, "Request timed out");
    }

    #[tokio::test]
    async fn test_smtp_defaults_to_port_25() {
        let (service, pool) = service(Script::outcome(true, 30, "SMTP:Success:mx ready"));
        let envelope = service.check(ProbeRequest::Smtp(host("mx.example.com"))).await;

        assert_eq!(pool.descriptors()[0].port, Some(25));
        assert_eq!(envelope.data.expect("data present").tested_port, Some(25));
    }

    #[tokio::test]
    async fn test_quantum_result_carries_key_exchange() {
        let (service, _) = service(Script::outcome(
            true,
            55,
            "QUANTUM:Success:Quantum safe key exchange:X25519MLKEM768",
        ));
        let envelope = service
            .check_quantum(UrlRequest::new("https://example.com"))
            .await;

        assert!(envelope.success);
        assert!(envelope.message.starts_with("SERVICE : CheckQuantum : "));
        let data = envelope.data.expect("data present");
        assert_eq!(data.quantum_key_exchange, "X25519MLKEM768");
        assert_eq!(
            data.setup_monitor,
            "To setup a quantum ready monitor visit : https://monitor.example"
        );
    }

    #[tokio::test]
    async fn test_identical_requests_give_identical_envelopes() {
        let (service, _) = service(Script::outcome(true, 7, "DNS:Success:1.1.1.1"));
        let request = ProbeRequest::Dns(host("one.one.one.one"));

        let first = serde_json::to_vec(&service.check(request.clone()).await).expect("json");
        let second = serde_json::to_vec(&service.check(request).await).expect("json");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_checks_on_same_target_are_isolated() {
        let (service, pool) = service(Script::outcome(true, 12, "SMTP:Success:mx ready"));
        let short_timeout = ProbeRequest::Smtp(host("mx.example.com").with_timeout_ms(3000));
        let submission_port = ProbeRequest::Smtp(host("mx.example.com").with_port(587));

        let (first, second) = tokio::join!(service.check(short_timeout), service.check(submission_port));

        for envelope in [&first, &second] {
            assert!(envelope.success);
            let data = envelope.data.as_ref().expect("data present");
            assert_eq!(data.response_time, Some(12));
            assert_eq!(data.result_status, "mx ready");
        }
        assert_eq!(first.data.expect("data present").tested_port, Some(25));
        assert_eq!(second.data.expect("data present").tested_port, Some(587));

        assert_eq!(pool.acquisitions(), 2);
        let mut timeouts: Vec<u64> = pool.descriptors().iter().map(|d| d.timeout_ms).collect();
        timeouts.sort_unstable();
        assert_eq!(timeouts, vec![3000, 20000]);
    }

    #[tokio::test]
    async fn test_validation_failure_never_acquires() {
        let (service, pool) = service(Script::outcome(true, 1, "ICMP:Success:x"));
        let envelope = service.check(ProbeRequest::Icmp(host("   "))).await;

        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.failure, Some(FailureKind::Validation));
        assert!(envelope.message.starts_with("SERVICE : CheckIcmp : Error : "));
        assert_eq!(pool.acquisitions(), 0);
    }

    #[tokio::test]
    async fn test_engine_faults_are_contained() {
        for script in [Script::AcquireFault, Script::RunFault, Script::Panic] {
            let (service, pool) = service(script.clone());
            let envelope = service.check(ProbeRequest::Icmp(host("10.0.0.1"))).await;

            assert!(!envelope.success, "{script:?}");
            assert!(envelope.data.is_none(), "{script:?}");
            assert_eq!(envelope.failure, Some(FailureKind::Engine), "{script:?}");
            assert!(envelope.message.contains(" Error : "), "{script:?}");
            assert_eq!(pool.acquisitions(), 1);
        }
    }

    #[tokio::test]
    async fn test_panic_message_reaches_trace() {
        let (service, _) = service(Script::Panic);
        let envelope = service.check(ProbeRequest::Icmp(host("10.0.0.1"))).await;
        assert!(envelope.message.ends_with("Connector panicked: connector blew up"));
    }

    #[tokio::test]
    async fn test_hanging_connector_is_bounded() {
        let (service, _) = service(Script::Hang);
        let request = ProbeRequest::Icmp(host("10.0.0.1").with_timeout_ms(50));
        let envelope = service.check(request).await;

        assert!(envelope.success);
        let data = envelope.data.expect("data present");
        assert!(!data.result_success);
        assert_eq!(data.response_time, None);
        assert_eq!(data.timeout_ms, Some(50));
        assert_eq!(data.result_status, "Timed out after 50 ms");
    }
}
