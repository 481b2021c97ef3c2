//! Error types for the settings channel.

use thiserror::Error;

/// Errors that can occur when building settings requests.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The shared key is not a valid AES key length.
    #[error("invalid key length: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength(usize),

    /// Settings could not be serialized to JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The authentication tag could not be computed.
    #[error("signing error: {0}")]
    Signing(String),
}

impl SettingsError {
    /// Create a signing error.
    pub fn signing(message: impl Into<String>) -> Self {
        SettingsError::Signing(message.into())
    }
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
