//! Device-reported error codes.
//!
//! Code table from the vendor's audio control API error reference. The
//! classification drives the caller-facing error taxonomy: caller mistakes
//! are never worth retrying, transient device states may be.

/// Known error codes returned by devices in the `error` tuple.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum DeviceErrorCode {
    Unknown,
    Generic,
    Timeout,
    IllegalArgument,
    IllegalRequest,
    IllegalState,
    NoSuchMethod,
    UnsupportedVersion,
    UnsupportedOperation,
    /// A code outside the documented table, kept raw for diagnostics
    Other(i64),
}

impl DeviceErrorCode {
    /// Map a raw numeric code from the wire to a known variant.
    pub fn from_code(code: i64) -> Self {
        match code {
            -1 => Self::Unknown,
            1 => Self::Generic,
            2 => Self::Timeout,
            3 => Self::IllegalArgument,
            5 => Self::IllegalRequest,
            7 => Self::IllegalState,
            12 => Self::NoSuchMethod,
            14 => Self::UnsupportedVersion,
            15 => Self::UnsupportedOperation,
            other => Self::Other(other),
        }
    }

    /// Classify the code for retry decisions.
    pub fn class(self) -> ErrorClass {
        match self {
            Self::IllegalArgument
            | Self::IllegalRequest
            | Self::NoSuchMethod
            | Self::UnsupportedVersion
            | Self::UnsupportedOperation => ErrorClass::InvalidRequest,
            Self::Timeout | Self::IllegalState => ErrorClass::Transient,
            Self::Unknown | Self::Generic | Self::Other(_) => ErrorClass::Other,
        }
    }
}

/// Retryability classification of a device-reported error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorClass {
    /// The request itself was wrong; retrying the same call cannot succeed
    InvalidRequest,
    /// A transient device condition; the caller may retry
    Transient,
    /// Anything else; surfaced with the original code for diagnostics
    Other,
}
