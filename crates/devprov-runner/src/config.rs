//! Provisioning configuration.
//!
//! Loaded from YAML. Every field has a default except the authentication key,
//! which must come from the file or the command line before provisioning.
//!
//! ```yaml
//! endpoint: "127.0.0.1:5000"
//! auth_key: "000102030405060708090a0b0c0d0e0f"
//! addresses:
//!   settings: 0x11
//!   fwinfo: 0x12
//!   service: 0x10
//! target_settings:
//!   app/brightness: 25
//!   save: true
//! timing:
//!   response_timeout_s: 2.0
//!   reconnect_attempts: 10
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use devprov_settings::{Settings, KEY_SAVE};

use crate::error::ConfigError;

/// Default TCP endpoint of the serial bridge.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:5000";

/// MCUmgr SMP "OS reset" request.
pub const DEFAULT_RESTART_COMMAND: [u8; 8] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05];

// ============================================================================
// Hex-encoded bytes
// ============================================================================

/// Bytes written as a hex string in YAML and on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    /// Parse a hex string, ignoring surrounding whitespace.
    pub fn parse(s: &str, field: &'static str) -> Result<Self, ConfigError> {
        hex::decode(s.trim())
            .map(HexBytes)
            .map_err(|source| ConfigError::InvalidHex { field, source })
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for HexBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HexBytes::parse(&s, "hex").map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Mux addresses of the device's logical channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MuxAddresses {
    /// Settings (JSON) channel.
    pub settings: u8,
    /// Firmware-info channel.
    pub fwinfo: u8,
    /// SMP service channel (restart).
    pub service: u8,
}

impl Default for MuxAddresses {
    fn default() -> Self {
        MuxAddresses {
            settings: 0x11,
            fwinfo: 0x12,
            service: 0x10,
        }
    }
}

/// Timeouts, delays and retry bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Wait for a settings reply.
    pub response_timeout_s: f64,
    /// Wait for the serial number.
    pub serial_timeout_s: f64,
    /// Pause after a write before reading back.
    pub processing_delay_s: f64,
    /// Pause before each reconnect attempt.
    pub reconnect_interval_s: f64,
    /// Wait for the settings reply after reconnecting.
    pub reconnect_timeout_s: f64,
    /// Reconnect attempts before giving up.
    pub reconnect_attempts: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            response_timeout_s: 2.0,
            serial_timeout_s: 5.0,
            processing_delay_s: 0.2,
            reconnect_interval_s: 1.0,
            reconnect_timeout_s: 1.0,
            reconnect_attempts: 10,
        }
    }
}

impl TimingConfig {
    /// How long to wait for a settings reply.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.response_timeout_s)
    }

    /// How long to wait for the serial number.
    pub fn serial_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.serial_timeout_s)
    }

    /// Pause between a settings write and its read-back.
    pub fn processing_delay(&self) -> Duration {
        Duration::from_secs_f64(self.processing_delay_s)
    }

    /// Pause before each reconnect attempt.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs_f64(self.reconnect_interval_s)
    }

    /// Settings reply timeout while reconnecting.
    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.reconnect_timeout_s)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("response_timeout_s", self.response_timeout_s),
            ("serial_timeout_s", self.serial_timeout_s),
            ("processing_delay_s", self.processing_delay_s),
            ("reconnect_interval_s", self.reconnect_interval_s),
            ("reconnect_timeout_s", self.reconnect_timeout_s),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }
        if self.reconnect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reconnect_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Provisioning configuration
// ============================================================================

/// Everything the provisioning workflow needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// `host:port` of the serial bridge.
    pub endpoint: String,
    /// Shared AES key (16, 24 or 32 bytes).
    pub auth_key: Option<HexBytes>,
    /// Mux addresses.
    pub addresses: MuxAddresses,
    /// Payload sent on the service channel to restart the device.
    pub restart_command: HexBytes,
    /// Settings to apply with a signed write.
    pub target_settings: Settings,
    /// Timeouts and retries.
    pub timing: TimingConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        ProvisionConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth_key: None,
            addresses: MuxAddresses::default(),
            restart_command: HexBytes(DEFAULT_RESTART_COMMAND.to_vec()),
            target_settings: default_target_settings(),
            timing: TimingConfig::default(),
        }
    }
}

fn default_target_settings() -> Settings {
    let mut settings = Settings::new();
    settings.insert("app/brightness".to_string(), Value::from(25));
    settings.insert(KEY_SAVE.to_string(), Value::Bool(true));
    settings
}

impl ProvisionConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load and parse a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// The configured key, checked for a supported AES key length.
    pub fn key(&self) -> Result<&[u8], ConfigError> {
        let key = self.auth_key.as_ref().ok_or(ConfigError::MissingKey)?;
        match key.0.len() {
            16 | 24 | 32 => Ok(key.as_bytes()),
            n => Err(ConfigError::InvalidKeyLength(n)),
        }
    }

    /// Check everything provisioning depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.key()?;
        self.timing.validate()?;
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint is empty".to_string()));
        }
        if self.restart_command.0.is_empty() {
            return Err(ConfigError::Invalid("restart_command is empty".to_string()));
        }
        let MuxAddresses { settings, fwinfo, service } = self.addresses;
        if settings == fwinfo || settings == service || fwinfo == service {
            return Err(ConfigError::Invalid(format!(
                "mux addresses must be distinct: settings={:#04x} fwinfo={:#04x} service={:#04x}",
                settings, fwinfo, service
            )));
        }
        Ok(())
    }
}
