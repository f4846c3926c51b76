//! Session configuration.

use std::time::Duration;

use crate::endpoint::ProtocolKind;

/// Configuration for a device session.
///
/// The engine imposes no per-call timeout; callers needing bounded latency
/// wrap `invoke` externally. The timeouts here only bound connection
/// establishment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Force a specific transport instead of preferring websocket
    pub force_protocol: Option<ProtocolKind>,
    /// Timeout for the initial HTTP connection and the websocket handshake
    pub connect_timeout: Duration,
    /// Capacity of the outbound frame channel on the duplex connection
    pub outbound_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            force_protocol: None,
            connect_timeout: Duration::from_secs(5),
            outbound_buffer_size: 32,
        }
    }
}

impl SessionConfig {
    /// Convenience for callers that want plain HTTP only.
    pub fn http_only() -> Self {
        Self {
            force_protocol: Some(ProtocolKind::XhrPost),
            ..Self::default()
        }
    }
}
