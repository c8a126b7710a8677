use serde::Serialize;

/// Which stage turned an envelope into a failure. Not serialized; the HTTP
/// host uses it to pick the transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Engine,
}

/// Uniform response wrapper returned for every authorized check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl<T> ResultEnvelope<T> {
    pub fn started(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            failure: None,
        }
    }

    pub fn complete(&mut self, status_message: &str, data: T) {
        self.message.push(' ');
        self.message.push_str(status_message);
        self.success = true;
        self.data = Some(data);
        self.failure = None;
    }

    pub fn fail(&mut self, kind: FailureKind, detail: &str) {
        self.message.push_str(" Error : ");
        self.message.push_str(detail);
        self.success = false;
        self.data = None;
        self.failure = Some(kind);
    }
}

/// Payload for every probe family except quantum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub tested_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tested_port: Option<u16>,
    pub result_success: bool,
    pub result_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub setup_monitor: String,
}

/// Payload for the quantum-safe key exchange check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantumCheckResult {
    pub tested_url: String,
    pub result_success: bool,
    pub result_status: String,
    /// Negotiated key exchange group, empty when the engine could not tell.
    pub quantum_key_exchange: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub setup_monitor: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serialization_skips_failure_kind() {
        let mut envelope: ResultEnvelope<CheckResult> =
            ResultEnvelope::started("SERVICE : CheckIcmp :");
        envelope.fail(FailureKind::Validation, "Address is empty for icmp check");

        let json = serde_json::to_value(&envelope).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "message": "SERVICE : CheckIcmp : Error : Address is empty for icmp check",
                "data": null,
            })
        );
    }

    #[test]
    fn test_check_result_omits_absent_timing() {
        let result = CheckResult {
            tested_address: "1.1.1.1".to_string(),
            result_success: true,
            result_status: "Reply".to_string(),
            response_time: Some(12),
            ..Default::default()
        };
        let json = serde_json::to_value(&result).expect("serializable");
        assert_eq!(json["responseTime"], 12);
        assert!(json.get("timeoutMs").is_none());
        assert!(json.get("testedPort").is_none());
    }
}
