//! Error types for the provisioning runner.

use devprov_fwinfo::FwInfoError;
use devprov_settings::SettingsError;
use thiserror::Error;

/// Errors raised while talking over an open link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No connection is open.
    #[error("link is not connected")]
    NotConnected,

    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by a frame handler.
///
/// The dispatcher logs these per handler; they never stop the stream.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Firmware-info payload could not be decoded.
    #[error("failed to parse FWINFO response: {0}")]
    FwInfo(#[from] FwInfoError),

    /// Any other handler failure.
    #[error("{0}")]
    Other(String),
}

/// Errors in a provisioning configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the config file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid YAML for this schema.
    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A hex-encoded value is malformed.
    #[error("invalid hex in '{field}': {source}")]
    InvalidHex {
        /// Config field name.
        field: &'static str,
        /// Decoding error.
        source: hex::FromHexError,
    },

    /// No authentication key was configured.
    #[error("no auth key configured")]
    MissingKey,

    /// The key has an unsupported length.
    #[error("auth key must be 16, 24 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Any other out-of-range value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level errors for the runner and the CLI.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// I/O error (e.g. opening the initial connection).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Link failure outside the provisioning workflow.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Settings request could not be built.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The interrupt handler could not be installed.
    #[error("signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Result type alias for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
