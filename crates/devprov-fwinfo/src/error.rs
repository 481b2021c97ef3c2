//! Error types for the firmware-info codec.

use thiserror::Error;

/// Errors that can occur when decoding firmware-info messages.
#[derive(Error, Debug, Clone)]
pub enum FwInfoError {
    /// The payload is not a valid `CommandMessage`: truncated, malformed or
    /// carrying a non-UTF-8 string.
    #[error("invalid firmware-info message: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Result type alias for firmware-info operations.
pub type FwInfoResult<T> = Result<T, FwInfoError>;
