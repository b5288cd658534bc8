// src/integrations/envelope.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// The three-field message exchanged with the coordinator service.
///
/// Requests carry `requester_service` and `payload` (with `payload.action`
/// selecting the remote operation); the coordinator echoes the envelope back
/// with `response` filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub requester_service: String,
    pub payload: Value,
    #[serde(default)]
    pub response: Value,
}

impl Envelope {
    /// Wraps an action and its fields into a request envelope.
    /// Non-object `fields` are ignored; the action always wins over a
    /// conflicting `action` key in the fields.
    pub fn wrap(requester_service: &str, action: &str, fields: Value) -> Self {
        let mut payload = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        payload.insert("action".to_string(), json!(action));

        Envelope {
            requester_service: requester_service.to_string(),
            payload: Value::Object(payload),
            response: Value::Null,
        }
    }

    /// Extracts the response body, treating a missing or null `response`
    /// field as absent.
    pub fn unwrap_response(self) -> Option<Value> {
        match self.response {
            Value::Null => None,
            other => Some(other),
        }
    }

    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_inserts_action_into_fields() {
        let env = Envelope::wrap("examgate", "fetch_exam_policy", json!({"user_id": 1}));
        assert_eq!(env.requester_service, "examgate");
        assert_eq!(env.action(), Some("fetch_exam_policy"));
        assert_eq!(env.payload["user_id"], 1);
        assert!(env.unwrap_response().is_none());
    }

    #[test]
    fn wrap_handles_empty_fields() {
        let env = Envelope::wrap("examgate", "ping", Value::Null);
        assert_eq!(env.action(), Some("ping"));
    }

    #[test]
    fn unwrap_returns_filled_response() {
        let mut env = Envelope::wrap("examgate", "fetch_exam_policy", Value::Null);
        env.response = json!({"passing_grade": 70.0});
        let resp = env.unwrap_response().unwrap();
        assert_eq!(resp["passing_grade"], 70.0);
    }

    #[test]
    fn wire_shape_round_trips() {
        let env = Envelope::wrap("examgate", "push_results", json!({"exam_id": 9}));
        let wire = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&wire).unwrap();
        assert_eq!(back.requester_service, "examgate");
        assert_eq!(back.action(), Some("push_results"));
    }
}
