//! Typed views of common device payloads.
//!
//! Devices send more fields than these containers model, and firmware
//! revisions disagree about which ones are present, so every container
//! deserializes leniently: unknown fields are ignored, most known fields
//! are optional.

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Power status of the device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Power {
    /// True when the device reports "active"
    #[serde(deserialize_with = "active_to_bool")]
    pub status: bool,
    #[serde(default)]
    pub standby_detail: Option<String>,
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status {
            write!(f, "Power on")
        } else {
            write!(f, "Power off")
        }
    }
}

/// One volume setting; devices with zones report several.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub volume: i64,
    #[serde(default)]
    pub max_volume: Option<i64>,
    #[serde(default)]
    pub min_volume: Option<i64>,
    #[serde(default)]
    pub step: Option<i64>,
    #[serde(default, deserialize_with = "on_off_to_bool")]
    pub mute: bool,
    #[serde(default)]
    pub output: Option<String>,
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let max = self
            .max_volume
            .map(|m| m.to_string())
            .unwrap_or_else(|| "?".to_string());
        // Zone outputs look like ".../zone=2"
        let zone = self
            .output
            .as_deref()
            .and_then(|o| o.rsplit_once('=').map(|(_, z)| z))
            .filter(|z| !z.is_empty());
        match zone {
            Some(zone) => write!(f, "Zone {zone} Volume: {}/{max}", self.volume)?,
            None => write!(f, "Volume: {}/{max}", self.volume)?,
        }
        if self.mute {
            write!(f, " (muted)")?;
        }
        Ok(())
    }
}

/// Generic product information.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfo {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub product_category: Option<String>,
    #[serde(default)]
    pub interface_version: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
}

/// System information, mac addresses and firmware version included.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sysinfo {
    #[serde(default)]
    pub bd_addr: Option<String>,
    #[serde(default)]
    pub mac_addr: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub wireless_mac_addr: Option<String>,
    #[serde(default)]
    pub bssid: Option<String>,
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default, rename = "bleID")]
    pub ble_id: Option<String>,
}

/// "active"/"off" power strings.
fn active_to_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => Ok(s == "active"),
        _ => Ok(false),
    }
}

/// "on"/"off" toggle strings; some firmware already sends booleans.
fn on_off_to_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => Ok(s == "on"),
        _ => Ok(false),
    }
}
