//! Wire envelope encoding and shape-based decoding.
//!
//! One envelope shape covers every exchange with the device:
//!
//! ```text
//! request:       {"method": "getPowerStatus", "params": [...], "version": "1.1", "id": 3}
//! result:        {"result": [...], "id": 3}
//! error:         {"error": [12, "No Such Method"], "id": 3}
//! notification:  {"method": "notifyVolumeInformation", "params": [...], "version": "1.0"}
//! ```
//!
//! The distinguishing feature of a notification is the absence of an `id`.
//! Decoding goes by these shapes only; devices are known to mislabel the
//! HTTP content type, so the transport must never gate decoding on it.

use serde::Serialize;
use serde_json::Value;

use crate::error::WireError;

/// A single outgoing remote call.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub method: String,
    pub params: Vec<Value>,
    pub version: String,
    pub id: u64,
}

impl RequestEnvelope {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>, version: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params,
            version: version.into(),
            id,
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn encode(&self) -> String {
        // A struct of plain strings, numbers and Values cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A decoded incoming envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Successful response to the request with the given id
    Result { id: u64, result: Vec<Value> },
    /// Device-reported failure for the request with the given id
    Error { id: u64, code: i64, message: String },
    /// Unsolicited push; carries no id
    Notification { name: String, params: Vec<Value> },
}

/// Decode an incoming body by shape.
///
/// Returns [`WireError::Malformed`] when the body is not JSON or parses to
/// something that is neither a response nor a notification.
pub fn decode_incoming(body: &str) -> Result<Incoming, WireError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| WireError::Malformed(format!("not valid JSON: {e}")))?;

    let obj = value
        .as_object()
        .ok_or_else(|| WireError::Malformed("top-level value is not an object".into()))?;

    if let Some(id) = obj.get("id").and_then(Value::as_u64) {
        if let Some(result) = obj.get("result") {
            let result = result
                .as_array()
                .cloned()
                .ok_or_else(|| WireError::Malformed("result is not an array".into()))?;
            return Ok(Incoming::Result { id, result });
        }
        if let Some(error) = obj.get("error") {
            let (code, message) = decode_error_tuple(error)?;
            return Ok(Incoming::Error { id, code, message });
        }
        return Err(WireError::Malformed(
            "response carries an id but neither result nor error".into(),
        ));
    }

    if let Some(name) = obj.get("method").and_then(Value::as_str) {
        let params = obj
            .get("params")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        return Ok(Incoming::Notification {
            name: name.to_string(),
            params,
        });
    }

    Err(WireError::Malformed(
        "no request id and no notification marker".into(),
    ))
}

/// The error member is a `[code, message]` tuple; some firmware omits the
/// message.
fn decode_error_tuple(error: &Value) -> Result<(i64, String), WireError> {
    let tuple = error
        .as_array()
        .ok_or_else(|| WireError::Malformed("error is not a tuple".into()))?;

    let code = tuple
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| WireError::Malformed("error tuple lacks a numeric code".into()))?;

    let message = tuple
        .get(1)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok((code, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_encodes_expected_fields() {
        let req = RequestEnvelope::new(3, "getPowerStatus", vec![json!({})], "1.1");
        let encoded: Value = serde_json::from_str(&req.encode()).unwrap();

        assert_eq!(encoded["method"], "getPowerStatus");
        assert_eq!(encoded["params"], json!([{}]));
        assert_eq!(encoded["version"], "1.1");
        assert_eq!(encoded["id"], 3);
    }

    #[test]
    fn round_trip_preserves_request_id() {
        let req = RequestEnvelope::new(42, "getVolumeInformation", vec![], "1.0");
        let _ = req.encode();

        // Response as the device would mirror it back
        let response = json!({"result": [[{"volume": 20}]], "id": 42}).to_string();
        match decode_incoming(&response).unwrap() {
            Incoming::Result { id, .. } => assert_eq!(id, req.id),
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[test]
    fn decodes_error_response() {
        let body = json!({"error": [12, "No Such Method"], "id": 7}).to_string();
        match decode_incoming(&body).unwrap() {
            Incoming::Error { id, code, message } => {
                assert_eq!(id, 7);
                assert_eq!(code, 12);
                assert_eq!(message, "No Such Method");
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn error_without_message_defaults_empty() {
        let body = json!({"error": [2], "id": 1}).to_string();
        match decode_incoming(&body).unwrap() {
            Incoming::Error { code, message, .. } => {
                assert_eq!(code, 2);
                assert!(message.is_empty());
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn body_without_id_is_a_notification() {
        let body = json!({
            "method": "notifyVolumeInformation",
            "params": [{"volume": 15, "mute": "off", "output": ""}],
            "version": "1.0"
        })
        .to_string();

        match decode_incoming(&body).unwrap() {
            Incoming::Notification { name, params } => {
                assert_eq!(name, "notifyVolumeInformation");
                assert_eq!(params.len(), 1);
            }
            other => panic!("expected Notification, got {other:?}"),
        }
    }

    #[test]
    fn notification_without_params_gets_empty_list() {
        let body = json!({"method": "notifyPowerStatus"}).to_string();
        match decode_incoming(&body).unwrap() {
            Incoming::Notification { name, params } => {
                assert_eq!(name, "notifyPowerStatus");
                assert!(params.is_empty());
            }
            other => panic!("expected Notification, got {other:?}"),
        }
    }

    #[test]
    fn unrecognizable_shapes_are_malformed() {
        assert!(decode_incoming("not json at all").is_err());
        assert!(decode_incoming("[1, 2, 3]").is_err());
        assert!(decode_incoming(r#"{"id": 5}"#).is_err());
        assert!(decode_incoming(r#"{"unrelated": true}"#).is_err());
    }

    #[test]
    fn malformed_error_tuple_is_rejected() {
        let body = json!({"error": "boom", "id": 1}).to_string();
        assert!(decode_incoming(&body).is_err());

        let body = json!({"error": ["not-a-code"], "id": 1}).to_string();
        assert!(decode_incoming(&body).is_err());
    }
}
