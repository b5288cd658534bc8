// src/integrations/gateway.rs

use std::time::Duration;

use ed25519_dalek::SigningKey;
use reqwest::Client;
use serde_json::Value;

use crate::config::Config;
use crate::integrations::envelope::Envelope;
use crate::integrations::signature::{generate_signature, signing_key_from_base64};

/// Shared transport for every integration gateway.
///
/// Sends signed envelopes to the coordinator with a bounded timeout. Callers
/// go through [`GatewayClient::dispatch`], which never fails: any transport
/// error, timeout, non-success status or structurally-empty response is
/// replaced by the caller's deterministic mock. Exam creation and grading
/// must never be blocked by a downstream outage.
#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
    service_name: String,
    signing_key: Option<SigningKey>,
    timeout: Duration,
}

impl GatewayClient {
    pub fn from_config(config: &Config) -> Self {
        let signing_key = config
            .service_signing_key
            .as_deref()
            .and_then(signing_key_from_base64);

        if signing_key.is_none() {
            tracing::warn!(
                "No service signing key configured; envelopes will be sent unsigned"
            );
        }

        GatewayClient {
            http: Client::new(),
            base_url: config.coordinator_url.trim_end_matches('/').to_string(),
            service_name: config.service_name.clone(),
            signing_key,
            timeout: Duration::from_secs(config.gateway_timeout_secs),
        }
    }

    /// Sends `action` to `system` via the coordinator and returns the
    /// response body, or `mock` if anything at all goes wrong.
    ///
    /// `required_field` is the business-relevant key that must be present
    /// and non-empty in the response for it to count as usable. Gateways
    /// never retry; one failed attempt triggers fallback.
    pub async fn dispatch(
        &self,
        system: &str,
        action: &str,
        fields: Value,
        required_field: &str,
        mock: Value,
    ) -> Value {
        match self.send(system, action, fields).await {
            Ok(response) => {
                if field_is_usable(&response, required_field) {
                    response
                } else {
                    self.fall_back(system, "empty_or_malformed_response", mock)
                }
            }
            Err(reason) => self.fall_back(system, &reason, mock),
        }
    }

    async fn send(&self, system: &str, action: &str, fields: Value) -> Result<Value, String> {
        let envelope = Envelope::wrap(&self.service_name, action, fields);
        let url = format!("{}/broker/{}", self.base_url, system);

        let mut request = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .header("X-Service-Name", &self.service_name)
            .json(&envelope);

        if let Some(key) = &self.signing_key {
            let signature = generate_signature(&self.service_name, key, &envelope.payload);
            request = request.header("X-Signature", signature);
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "timeout".to_string()
                } else {
                    format!("transport: {}", e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {}", status.as_u16()));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| format!("decode: {}", e))?;

        envelope
            .unwrap_response()
            .ok_or_else(|| "missing_response".to_string())
    }

    fn fall_back(&self, system: &str, reason: &str, mock: Value) -> Value {
        tracing::warn!("MOCK-FALLBACK {}: {}", system, reason);
        mock
    }
}

/// A response is usable only if the business field exists and is non-empty.
fn field_is_usable(response: &Value, field: &str) -> bool {
    match response.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_client(base_url: &str, timeout: Duration) -> GatewayClient {
        GatewayClient {
            http: Client::new(),
            base_url: base_url.to_string(),
            service_name: "examgate".to_string(),
            signing_key: Some(SigningKey::from_bytes(&[3u8; 32])),
            timeout,
        }
    }

    #[test]
    fn usable_field_rules() {
        assert!(field_is_usable(&json!({"skills": [1]}), "skills"));
        assert!(field_is_usable(&json!({"passing_grade": 70}), "passing_grade"));
        assert!(!field_is_usable(&json!({"skills": []}), "skills"));
        assert!(!field_is_usable(&json!({"skills": ""}), "skills"));
        assert!(!field_is_usable(&json!({"skills": null}), "skills"));
        assert!(!field_is_usable(&json!({}), "skills"));
    }

    #[tokio::test]
    async fn dispatch_falls_back_on_unreachable_host() {
        // Nothing listens here; the transport error must be absorbed.
        let client = test_client("http://127.0.0.1:1", Duration::from_secs(1));
        let mock = json!({"passing_grade": 70.0});

        let out = client
            .dispatch(
                "directory",
                "fetch_exam_policy",
                json!({"user_id": 1}),
                "passing_grade",
                mock.clone(),
            )
            .await;

        assert_eq!(out, mock);
    }
}
