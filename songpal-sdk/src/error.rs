use songpal_client::ClientError;
use thiserror::Error;

/// Errors surfaced by the typed facade
#[derive(Debug, Error)]
pub enum SdkError {
    /// Failure from the underlying protocol engine
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The device answered, but not with the payload shape this facade
    /// models
    #[error("Unexpected payload from {method}: {reason}")]
    UnexpectedPayload { method: String, reason: String },
}

/// Type alias for results that can return an SdkError
pub type Result<T> = std::result::Result<T, SdkError>;
