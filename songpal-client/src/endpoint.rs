//! Device endpoint addressing.
//!
//! A SongPal endpoint is the base API URL discovered over UPnP or supplied
//! by hand, e.g. `http://192.168.1.50:10000/sony`. Every other URL the
//! engine needs is derived from it: the guide URL answering the capability
//! manifest, per-service URLs for HTTP calls, and the websocket URL for the
//! duplex connection.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{ClientError, Result};

/// Environment variable consulted by [`Endpoint::from_env`].
pub const ENDPOINT_ENV_VAR: &str = "SONGPAL_ENDPOINT";

/// Base address of one device's API.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Parse an endpoint from its base URL.
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| ClientError::Connect(format!("invalid endpoint URL {base}: {e}")))?;
        if base.host_str().is_none() {
            return Err(ClientError::Connect(format!(
                "endpoint URL {base} has no host"
            )));
        }
        Ok(Self { base })
    }

    /// Read the endpoint from the `SONGPAL_ENDPOINT` environment variable.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(ENDPOINT_ENV_VAR).map_err(|_| {
            ClientError::Connect(format!("{ENDPOINT_ENV_VAR} is not set"))
        })?;
        Self::new(&raw)
    }

    /// The base URL as given.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// URL answering `getSupportedApiInfo` (path fixed to `/sony/guide`).
    pub fn guide_url(&self) -> Url {
        let mut url = self.base.clone();
        url.set_path("/sony/guide");
        url
    }

    /// Per-service URL for HTTP calls, `<base>/<service>`.
    pub fn service_url(&self, service: &str) -> Url {
        let mut url = self.base.clone();
        let path = format!("{}/{}", url.path().trim_end_matches('/'), service);
        url.set_path(&path);
        url
    }

    /// Base URL with the scheme rewritten for the duplex connection.
    pub fn websocket_url(&self) -> Url {
        let mut url = self.base.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // set_scheme only rejects invalid transitions, which ws/wss are not
        let _ = url.set_scheme(scheme);
        url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)
    }
}

/// Transport capability tokens a service advertises in its manifest entry.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ProtocolKind {
    /// `websocket:jsonizer`, the persistent duplex channel
    WebSocket,
    /// `xhrpost:jsonizer`, one HTTP POST per call
    XhrPost,
}

impl ProtocolKind {
    /// The token as it appears in the self-description.
    pub fn as_token(self) -> &'static str {
        match self {
            Self::WebSocket => "websocket:jsonizer",
            Self::XhrPost => "xhrpost:jsonizer",
        }
    }
}

impl FromStr for ProtocolKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "websocket:jsonizer" => Ok(Self::WebSocket),
            "xhrpost:jsonizer" => Ok(Self::XhrPost),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_guide_service_and_websocket_urls() {
        let endpoint = Endpoint::new("http://192.168.1.50:10000/sony").unwrap();

        assert_eq!(
            endpoint.guide_url().as_str(),
            "http://192.168.1.50:10000/sony/guide"
        );
        assert_eq!(
            endpoint.service_url("audio").as_str(),
            "http://192.168.1.50:10000/sony/audio"
        );
        assert_eq!(
            endpoint.websocket_url().as_str(),
            "ws://192.168.1.50:10000/sony"
        );
    }

    #[test]
    fn https_maps_to_wss() {
        let endpoint = Endpoint::new("https://device.local/sony").unwrap();
        assert_eq!(endpoint.websocket_url().scheme(), "wss");
    }

    #[test]
    fn rejects_unparseable_urls() {
        assert!(Endpoint::new("not a url").is_err());
        assert!(Endpoint::new("/sony").is_err());
    }

    #[test]
    fn protocol_tokens_round_trip() {
        assert_eq!(
            "websocket:jsonizer".parse::<ProtocolKind>().unwrap(),
            ProtocolKind::WebSocket
        );
        assert_eq!(
            "xhrpost:jsonizer".parse::<ProtocolKind>().unwrap(),
            ProtocolKind::XhrPost
        );
        assert!("polling:xml".parse::<ProtocolKind>().is_err());
        assert_eq!(ProtocolKind::WebSocket.as_token(), "websocket:jsonizer");
    }
}
