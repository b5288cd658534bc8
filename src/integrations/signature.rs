// src/integrations/signature.rs

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Prefix binding signatures to this protocol.
const MESSAGE_PREFIX: &str = "examgate";

/// Builds the canonical message that is signed:
/// `"examgate-<service>-<hex(sha256(json(payload)))>"`.
///
/// Binding both the caller identity and the payload digest into the message
/// prevents replaying a signature across payloads or service identities.
fn canonical_message(service_name: &str, payload: &Value) -> String {
    let digest = Sha256::digest(payload.to_string().as_bytes());
    format!("{}-{}-{}", MESSAGE_PREFIX, service_name, hex::encode(digest))
}

/// Signs the canonical message for `payload` and returns a base64 signature.
pub fn generate_signature(service_name: &str, key: &SigningKey, payload: &Value) -> String {
    let message = canonical_message(service_name, payload);
    let sig: Signature = key.sign(message.as_bytes());
    STANDARD.encode(sig.to_bytes())
}

/// Recomputes the canonical message and checks the base64 signature
/// against the verifying key.
pub fn verify_signature(
    service_name: &str,
    signature_b64: &str,
    key: &VerifyingKey,
    payload: &Value,
) -> bool {
    let Ok(raw) = STANDARD.decode(signature_b64) else {
        return false;
    };
    let raw: [u8; 64] = match raw.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let sig = Signature::from_bytes(&raw);
    let message = canonical_message(service_name, payload);
    key.verify(message.as_bytes(), &sig).is_ok()
}

/// Decodes a base64-encoded Ed25519 seed into a signing key.
/// Returns None (and logs) on malformed input so a bad key degrades to
/// unsigned mode rather than taking the service down.
pub fn signing_key_from_base64(encoded: &str) -> Option<SigningKey> {
    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| tracing::warn!("Invalid SERVICE_SIGNING_KEY base64: {}", e))
        .ok()?;
    let seed: [u8; 32] = raw
        .try_into()
        .map_err(|_| tracing::warn!("SERVICE_SIGNING_KEY must decode to 32 bytes"))
        .ok()?;
    Some(SigningKey::from_bytes(&seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn round_trip_verifies() {
        let key = test_key();
        let payload = json!({"action": "fetch_exam_policy", "user_id": 42});

        let sig = generate_signature("examgate", &key, &payload);
        assert!(verify_signature(
            "examgate",
            &sig,
            &key.verifying_key(),
            &payload
        ));
    }

    #[test]
    fn mutated_payload_fails() {
        let key = test_key();
        let payload = json!({"action": "fetch_exam_policy", "user_id": 42});
        let sig = generate_signature("examgate", &key, &payload);

        let tampered = json!({"action": "fetch_exam_policy", "user_id": 43});
        assert!(!verify_signature(
            "examgate",
            &sig,
            &key.verifying_key(),
            &tampered
        ));
    }

    #[test]
    fn different_service_name_fails() {
        let key = test_key();
        let payload = json!({"action": "push_results"});
        let sig = generate_signature("examgate", &key, &payload);

        assert!(!verify_signature(
            "other-service",
            &sig,
            &key.verifying_key(),
            &payload
        ));
    }

    #[test]
    fn garbage_signature_fails() {
        let key = test_key();
        let payload = json!({"a": 1});
        assert!(!verify_signature(
            "examgate",
            "not base64!!",
            &key.verifying_key(),
            &payload
        ));
    }

    #[test]
    fn signing_key_decodes_from_base64() {
        let encoded = STANDARD.encode([7u8; 32]);
        assert!(signing_key_from_base64(&encoded).is_some());
        assert!(signing_key_from_base64("short").is_none());
    }
}
