//! Error taxonomy for the client engine.
//!
//! The split mirrors what a caller can do about each failure: registry
//! failures are caller-fixable, transport failures may be retried at the
//! caller's discretion, device-reported failures carry a retryability
//! classification derived from the vendor error code. The engine itself
//! never retries.

use songpal_wire::WireError;
use thiserror::Error;

/// Errors surfaced by session, transport and registry operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// Duplex handshake failure; terminal for that connect attempt
    #[error("Connect failed: {0}")]
    Connect(String),

    /// HTTP-level failure; retryable at caller discretion
    #[error("Transport error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport {
        /// HTTP status when the failure was a non-success response
        status: Option<u16>,
        message: String,
    },

    /// A pending call was invalidated by connection teardown
    #[error("Connection closed while the call was pending")]
    ConnectionClosed,

    /// The websocket transport is required but not active
    #[error("Notifications require an active websocket connection")]
    DuplexUnavailable,

    /// Unparseable wire body
    #[error(transparent)]
    Malformed(#[from] WireError),

    /// The service name is not present in the device's self-description
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// The method name is not present within the service
    #[error("Service {service} has no method {method}")]
    UnknownMethod { service: String, method: String },

    /// The requested signature version is not advertised by the device
    #[error("{service}.{method} does not support version {version}")]
    UnsupportedVersion {
        service: String,
        method: String,
        version: String,
    },

    /// Caller-side contract violation against the resolved signature
    #[error("Argument mismatch for {method}: {reason}")]
    ArgumentMismatch { method: String, reason: String },

    /// Device rejected the request itself; retrying cannot succeed
    #[error("Invalid request (device code {code}): {message}")]
    InvalidRequest { code: i64, message: String },

    /// Transient device condition; the caller may retry
    #[error("Device busy (device code {code}): {message}")]
    RetryableDevice { code: i64, message: String },

    /// Any other device-reported failure, kept with its original code
    #[error("Device error (code {code}): {message}")]
    Device { code: i64, message: String },
}

/// Convenience type alias for Results using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display_includes_status() {
        let error = ClientError::Transport {
            status: Some(503),
            message: "service unavailable".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transport error (HTTP 503): service unavailable"
        );

        let error = ClientError::Transport {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(error.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn wire_error_converts() {
        let wire = WireError::Malformed("bad body".to_string());
        let client: ClientError = wire.into();
        assert!(matches!(client, ClientError::Malformed(_)));
    }
}
