//! Self-description document types.
//!
//! A device describes itself in two steps: `getSupportedApiInfo` against the
//! guide URL enumerates the services with their transport protocols and
//! notification names, then `getMethodTypes` against each service endpoint
//! lists the method signatures. Both replies arrive as generic envelopes;
//! the helpers here pull the typed documents out of them.
//!
//! Note the asymmetry in the wire format: `getSupportedApiInfo` answers
//! under `result`, `getMethodTypes` under `results`.

use serde::Deserialize;
use serde_json::Value;

use songpal_wire::WireError;

use crate::error::{ClientError, Result};

/// One service entry from `getSupportedApiInfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDescription {
    /// Service name, e.g. "system", "audio", "avContent"
    pub service: String,
    /// Transport capability tokens, e.g. "websocket:jsonizer"
    #[serde(default)]
    pub protocols: Vec<String>,
    /// Notification names this service can push
    #[serde(default)]
    pub notifications: Vec<NotificationDescription>,
}

/// A notification name with its advertised versions.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationDescription {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<NotificationVersion>,
}

/// One advertised version of a notification; some entries omit the field.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationVersion {
    #[serde(default)]
    pub version: Option<String>,
}

impl NotificationDescription {
    /// Highest advertised version, when any entry carries one.
    pub fn latest_version(&self) -> Option<&str> {
        self.versions
            .iter()
            .filter_map(|v| v.version.as_deref())
            .max()
    }
}

/// One signature row from `getMethodTypes`:
/// `[name, [parameter shapes], [reply shapes], version]`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureRow(
    pub String,
    pub Vec<String>,
    pub Vec<String>,
    pub String,
);

/// A service together with its fetched signature rows.
#[derive(Debug, Clone)]
pub struct ServiceBlock {
    pub description: ServiceDescription,
    pub signatures: Vec<SignatureRow>,
}

/// Extract the service list from a `getSupportedApiInfo` response body.
pub fn parse_supported_api(body: &Value) -> Result<Vec<ServiceDescription>> {
    if let Some(error) = body.get("error") {
        return Err(device_refusal("getSupportedApiInfo", error));
    }
    let services = body
        .get("result")
        .and_then(|r| r.get(0))
        .cloned()
        .ok_or_else(|| {
            ClientError::Malformed(WireError::Malformed(
                "getSupportedApiInfo response lacks a result".into(),
            ))
        })?;

    serde_json::from_value(services).map_err(|e| {
        ClientError::Malformed(WireError::Malformed(format!(
            "unreadable service list: {e}"
        )))
    })
}

/// Extract the signature rows from a `getMethodTypes` response body.
pub fn parse_method_types(body: &Value) -> Result<Vec<SignatureRow>> {
    if let Some(error) = body.get("error") {
        return Err(device_refusal("getMethodTypes", error));
    }
    let rows = body.get("results").cloned().ok_or_else(|| {
        ClientError::Malformed(WireError::Malformed(
            "getMethodTypes response lacks results".into(),
        ))
    })?;

    serde_json::from_value(rows).map_err(|e| {
        ClientError::Malformed(WireError::Malformed(format!(
            "unreadable signature rows: {e}"
        )))
    })
}

fn device_refusal(method: &str, error: &Value) -> ClientError {
    let code = error.get(0).and_then(Value::as_i64).unwrap_or(-1);
    let message = error
        .get(1)
        .and_then(Value::as_str)
        .unwrap_or(method)
        .to_string();
    ClientError::Device { code, message }
}
