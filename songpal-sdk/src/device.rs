//! Typed convenience wrapper around a device session.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use songpal_client::{
    DeviceSession, Endpoint, Listener, SessionConfig, Subscription,
};

use crate::containers::{InterfaceInfo, Power, Sysinfo, Volume};
use crate::error::{Result, SdkError};

/// A connected device with typed accessors for the everyday operations.
///
/// Everything else on the device remains reachable through
/// [`Device::raw_command`] or the underlying [`DeviceSession`].
#[derive(Debug)]
pub struct Device {
    session: DeviceSession,
}

impl Device {
    /// Connect with default configuration.
    pub async fn connect(endpoint: Endpoint) -> Result<Self> {
        Self::connect_with_config(endpoint, SessionConfig::default()).await
    }

    pub async fn connect_with_config(
        endpoint: Endpoint,
        config: SessionConfig,
    ) -> Result<Self> {
        let session = DeviceSession::connect(endpoint, config).await?;
        Ok(Self { session })
    }

    /// The underlying protocol session.
    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    /// Current power status.
    pub async fn power(&self) -> Result<Power> {
        let payload = self
            .session
            .invoke("system", "getPowerStatus", None, None)
            .await?;
        parse_payload("getPowerStatus", payload)
    }

    /// Turn the device on or off.
    pub async fn set_power(&self, on: bool) -> Result<()> {
        let status = if on { "active" } else { "off" };
        self.session
            .invoke(
                "system",
                "setPowerStatus",
                Some(json!({ "status": status })),
                None,
            )
            .await?;
        Ok(())
    }

    /// Volume information for every output the device reports.
    pub async fn volume_information(&self) -> Result<Vec<Volume>> {
        let payload = self
            .session
            .invoke("audio", "getVolumeInformation", Some(json!({})), None)
            .await?;
        let volumes: Vec<Volume> = parse_payload("getVolumeInformation", payload)?;
        if volumes.is_empty() {
            warn!("unable to get volume information");
        } else if volumes.len() > 1 {
            warn!("the device seems to have more than one volume setting");
        }
        Ok(volumes)
    }

    /// Set the volume level, optionally for a specific output.
    pub async fn set_volume(&self, volume: i64, output: Option<&str>) -> Result<()> {
        self.session
            .invoke(
                "audio",
                "setAudioVolume",
                Some(json!({
                    "volume": volume.to_string(),
                    "output": output.unwrap_or(""),
                })),
                None,
            )
            .await?;
        Ok(())
    }

    /// System information, mac addresses and firmware version included.
    pub async fn system_info(&self) -> Result<Sysinfo> {
        let payload = self
            .session
            .invoke("system", "getSystemInformation", None, None)
            .await?;
        parse_payload("getSystemInformation", payload)
    }

    /// Generic product information.
    pub async fn interface_information(&self) -> Result<InterfaceInfo> {
        let payload = self
            .session
            .invoke("system", "getInterfaceInformation", None, None)
            .await?;
        parse_payload("getInterfaceInformation", payload)
    }

    /// Call any method the device advertises, untyped.
    pub async fn raw_command(
        &self,
        service: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value> {
        info!("calling {service}.{method}({params:?})");
        Ok(self.session.invoke(service, method, params, None).await?)
    }

    /// Listen to everything a service can push.
    ///
    /// Registers the listener for the whole service and asks the device to
    /// enable every notification it advertises there (devices push nothing
    /// until told to switch notifications on).
    pub async fn listen_notifications(
        &self,
        service: &str,
        listener: Listener,
    ) -> Result<Subscription> {
        let enabled: Vec<Value> = self
            .session
            .notifications(service)
            .iter()
            .map(|n| {
                json!({
                    "name": n.name,
                    "version": n.version.as_deref().unwrap_or("1.0"),
                })
            })
            .collect();

        let subscription = self.session.subscribe(service, None, listener)?;

        if enabled.is_empty() {
            debug!("no notifications available for {service}");
        } else {
            self.session
                .invoke(
                    service,
                    "switchNotifications",
                    Some(json!({ "enabled": enabled })),
                    None,
                )
                .await?;
        }
        Ok(subscription)
    }

    /// Stop listening on one subscription.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.session.unsubscribe(subscription);
    }

    /// Close the session; any websocket teardown happens here. Idempotent.
    pub fn close(&self) {
        self.session.close();
    }
}

fn parse_payload<T: DeserializeOwned>(method: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| SdkError::UnexpectedPayload {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
