//! Error types for the wire codec

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire envelopes
#[derive(Debug, Error)]
pub enum WireError {
    /// The body is not parseable JSON, or parsed but matches no known
    /// envelope shape (no request id and no notification marker)
    #[error("Malformed wire message: {0}")]
    Malformed(String),
}
