//! Provisioning workflow.
//!
//! ```text
//! ReadInitial ─┬─ unlocked ─▶ SetupAccess ─▶ Lock ─┐
//!              └─ locked ──────────────────────────┴▶ FetchSerial ─▶ SignAndUpload
//!                                                                        │
//!                              Done ◀─ Reconnect ◀─ Restart ◀────────────┘
//! ```
//!
//! Every step before `Restart` is fatal on timeout or verification mismatch;
//! the workflow stops there and never restarts a half-provisioned device.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use devprov_fwinfo::{FwInfoCodec, ProtoFwInfoCodec};
use devprov_settings::{
    is_locked, verify, Settings, SettingsAuthorizer, ACL_ALL_ACCESS, KEY_ACL_0, KEY_KEY_0,
    KEY_LOCK, KEY_SAVE,
};

use crate::config::ProvisionConfig;
use crate::error::{LinkError, Result};
use crate::session::DeviceSession;
use crate::transport::Connector;

// ============================================================================
// States and outcomes
// ============================================================================

/// Workflow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisioningState {
    /// Read the current settings to learn whether the device is locked.
    ReadInitial,
    /// Grant key slot 0 full access and install the shared key.
    SetupAccess,
    /// Set the lock flag.
    Lock,
    /// Ask the firmware-info channel for the serial number.
    FetchSerial,
    /// Write the target settings in a signed envelope.
    SignAndUpload,
    /// Send the restart command and drop the connection.
    Restart,
    /// Poll until the restarted device answers a settings read.
    Reconnect,
    /// Provisioned and restarted.
    Done,
    /// Stopped; see the report's failure reason.
    Failed,
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why provisioning stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No settings reply within the response timeout.
    NoResponse(ProvisioningState),
    /// The read-back did not match what was written.
    VerificationFailed(ProvisioningState),
    /// The firmware-info channel did not report a serial number.
    NoSerial,
    /// The signed request could not be built.
    Signing(String),
    /// The connection failed mid-workflow.
    Transport(String),
    /// The device did not come back after the restart.
    RestartTimedOut {
        /// Attempts made.
        attempts: u32,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoResponse(state) => write!(f, "no response from device during {}", state),
            FailureReason::VerificationFailed(state) => write!(f, "verification failed during {}", state),
            FailureReason::NoSerial => write!(f, "failed to retrieve serial number"),
            FailureReason::Signing(msg) => write!(f, "signing failed: {}", msg),
            FailureReason::Transport(msg) => write!(f, "transport error: {}", msg),
            FailureReason::RestartTimedOut { attempts } => {
                write!(f, "device restart timed out after {} attempts", attempts)
            }
        }
    }
}

/// Final result of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every step succeeded.
    Done,
    /// The run stopped early.
    Failed(FailureReason),
}

/// What happened during [`Provisioner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningReport {
    /// How the run ended.
    pub outcome: Outcome,
    /// States entered, in order, ending with `Done` or `Failed`.
    pub states: Vec<ProvisioningState>,
    /// Serial number, if it was fetched.
    pub serial: Option<String>,
    /// Reconnect attempts made after the restart.
    pub reconnect_attempts: u32,
}

impl ProvisioningReport {
    /// Whether the run ended in `Done`.
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Done
    }

    /// The state the workflow ended in.
    pub fn final_state(&self) -> ProvisioningState {
        match self.outcome {
            Outcome::Done => ProvisioningState::Done,
            Outcome::Failed(_) => ProvisioningState::Failed,
        }
    }

    /// Whether the workflow passed through `state`.
    pub fn visited(&self, state: ProvisioningState) -> bool {
        self.states.contains(&state)
    }
}

/// Result of a single step: the next state, or why the run stops.
type Step = std::result::Result<ProvisioningState, FailureReason>;

impl From<LinkError> for FailureReason {
    fn from(e: LinkError) -> Self {
        FailureReason::Transport(e.to_string())
    }
}

// ============================================================================
// Provisioner
// ============================================================================

/// Drives one device through the provisioning workflow.
pub struct Provisioner {
    config: ProvisionConfig,
    session: DeviceSession,
    authorizer: SettingsAuthorizer,
    key: Vec<u8>,
    reconnect_attempts: u32,
}

impl Provisioner {
    /// Create a provisioner using the protobuf firmware-info codec.
    pub fn new(config: ProvisionConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        Self::with_codec(config, connector, Arc::new(ProtoFwInfoCodec))
    }

    /// Create a provisioner with a custom firmware-info codec.
    pub fn with_codec(
        config: ProvisionConfig,
        connector: Arc<dyn Connector>,
        codec: Arc<dyn FwInfoCodec>,
    ) -> Result<Self> {
        config.validate()?;
        let key = config.key()?.to_vec();
        let authorizer = SettingsAuthorizer::new(&key)?;
        let session = DeviceSession::new(connector, config.addresses, codec);
        Ok(Provisioner {
            config,
            session,
            authorizer,
            key,
            reconnect_attempts: 0,
        })
    }

    /// Run the workflow to completion.
    ///
    /// Only a failure to open the first connection is an `Err`; everything
    /// after that ends up in the report.
    pub async fn run(&mut self) -> Result<ProvisioningReport> {
        info!("Connecting to {}", self.session.endpoint());
        self.session.connect().await?;
        self.reconnect_attempts = 0;

        let mut states = Vec::new();
        let mut serial = None;
        let mut failure = None;
        let mut state = ProvisioningState::ReadInitial;

        loop {
            states.push(state);
            debug!("Entering state {}", state);
            let step = match state {
                ProvisioningState::Done | ProvisioningState::Failed => break,
                ProvisioningState::ReadInitial => self.read_initial().await,
                ProvisioningState::SetupAccess => self.setup_access().await,
                ProvisioningState::Lock => self.lock().await,
                ProvisioningState::FetchSerial => self.fetch_serial().await.map(|sn| {
                    serial = Some(sn);
                    ProvisioningState::SignAndUpload
                }),
                ProvisioningState::SignAndUpload => {
                    let sn = serial.clone().unwrap_or_default();
                    self.sign_and_upload(&sn).await
                }
                ProvisioningState::Restart => self.restart().await,
                ProvisioningState::Reconnect => self.reconnect().await,
            };
            state = match step {
                Ok(next) => next,
                Err(reason) => {
                    error!("Provisioning failed in {}: {}", state, reason);
                    failure = Some(reason);
                    ProvisioningState::Failed
                }
            };
        }

        let outcome = match failure {
            None => Outcome::Done,
            Some(reason) => Outcome::Failed(reason),
        };

        self.session.disconnect().await;
        if outcome == Outcome::Done {
            info!("Provisioning complete");
        }
        metrics::counter!(
            "devprov_provisioning_runs_total",
            "outcome" => if outcome == Outcome::Done { "done" } else { "failed" }
        )
        .increment(1);

        Ok(ProvisioningReport {
            outcome,
            states,
            serial,
            reconnect_attempts: self.reconnect_attempts,
        })
    }

    async fn read_initial(&mut self) -> Step {
        let timeout = self.config.timing.response_timeout();
        let snapshot = match self.session.read_settings(timeout).await? {
            Some(snapshot) if !snapshot.is_empty() => snapshot,
            _ => {
                error!("Failed to read settings");
                return Err(FailureReason::NoResponse(ProvisioningState::ReadInitial));
            }
        };
        let shown = Value::Object(snapshot.clone());
        info!("Received settings: {}", shown);

        if is_locked(&snapshot) {
            info!("Device is already locked, continuing with signed settings");
            Ok(ProvisioningState::FetchSerial)
        } else {
            Ok(ProvisioningState::SetupAccess)
        }
    }

    async fn setup_access(&mut self) -> Step {
        let mut settings = Settings::new();
        settings.insert(KEY_ACL_0.to_string(), Value::from(ACL_ALL_ACCESS));
        settings.insert(KEY_KEY_0.to_string(), Value::from(BASE64.encode(&self.key)));
        settings.insert(KEY_SAVE.to_string(), Value::Bool(true));

        info!("Setting up access permissions");
        self.upload(&settings, &settings, ProvisioningState::SetupAccess)
            .await?;
        Ok(ProvisioningState::Lock)
    }

    async fn lock(&mut self) -> Step {
        let mut settings = Settings::new();
        settings.insert(KEY_LOCK.to_string(), Value::Bool(true));
        settings.insert(KEY_SAVE.to_string(), Value::Bool(true));

        info!("Locking device settings");
        self.upload(&settings, &settings, ProvisioningState::Lock).await?;
        Ok(ProvisioningState::FetchSerial)
    }

    async fn fetch_serial(&mut self) -> std::result::Result<String, FailureReason> {
        let timeout = self.config.timing.serial_timeout();
        match self.session.fetch_serial(timeout).await? {
            Some(serial) => Ok(serial),
            None => {
                error!("Failed to retrieve serial number");
                Err(FailureReason::NoSerial)
            }
        }
    }

    async fn sign_and_upload(&mut self, serial: &str) -> Step {
        let target = self.config.target_settings.clone();
        let envelope = self
            .authorizer
            .sign(&target, serial)
            .map_err(|e| FailureReason::Signing(e.to_string()))?;
        let request = envelope.into_request(&target);

        info!("Uploading signed settings");
        self.upload(&request, &target, ProvisioningState::SignAndUpload)
            .await?;
        Ok(ProvisioningState::Restart)
    }

    async fn restart(&mut self) -> Step {
        info!("Restarting device");
        let command = self.config.restart_command.0.clone();
        self.session.send_restart(&command).await?;
        self.session.disconnect().await;
        Ok(ProvisioningState::Reconnect)
    }

    async fn reconnect(&mut self) -> Step {
        let timing = self.config.timing.clone();
        info!("Waiting for device to restart");

        for attempt in 1..=timing.reconnect_attempts {
            self.reconnect_attempts = attempt;
            tokio::time::sleep(timing.reconnect_interval()).await;

            if let Err(e) = self.session.connect().await {
                debug!("Reconnect attempt {} failed: {}", attempt, e);
                continue;
            }
            match self.session.read_settings(timing.reconnect_timeout()).await {
                Ok(Some(snapshot)) if !snapshot.is_empty() => {
                    info!("Device restarted successfully");
                    let shown = Value::Object(snapshot);
                    debug!("Settings after restart: {}", shown);
                    return Ok(ProvisioningState::Done);
                }
                Ok(_) => debug!("Reconnect attempt {}: no settings reply", attempt),
                Err(e) => debug!("Reconnect attempt {} failed: {}", attempt, e),
            }
            self.session.disconnect().await;
        }

        error!("Device restart timed out");
        Err(FailureReason::RestartTimedOut {
            attempts: timing.reconnect_attempts,
        })
    }

    /// Write `payload`, pause, read back and verify against `expected`.
    async fn upload(
        &mut self,
        payload: &Settings,
        expected: &Settings,
        step: ProvisioningState,
    ) -> std::result::Result<(), FailureReason> {
        self.session.write_settings(payload).await?;
        tokio::time::sleep(self.config.timing.processing_delay()).await;

        let timeout = self.config.timing.response_timeout();
        let Some(received) = self.session.read_settings(timeout).await? else {
            warn!("No settings reply after write during {}", step);
            return Err(FailureReason::NoResponse(step));
        };

        let keys: Vec<&str> = expected.keys().map(String::as_str).collect();
        if verify(expected, &received) {
            info!("Verification OK for {:?}", keys);
            Ok(())
        } else {
            error!("Verification failed for {:?}", keys);
            Err(FailureReason::VerificationFailed(step))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(
            FailureReason::VerificationFailed(ProvisioningState::Lock).to_string(),
            "verification failed during Lock"
        );
        assert_eq!(
            FailureReason::RestartTimedOut { attempts: 10 }.to_string(),
            "device restart timed out after 10 attempts"
        );
    }

    #[test]
    fn test_report_accessors() {
        let report = ProvisioningReport {
            outcome: Outcome::Failed(FailureReason::NoSerial),
            states: vec![
                ProvisioningState::ReadInitial,
                ProvisioningState::FetchSerial,
                ProvisioningState::Failed,
            ],
            serial: None,
            reconnect_attempts: 0,
        };
        assert!(!report.is_success());
        assert_eq!(report.final_state(), ProvisioningState::Failed);
        assert!(report.visited(ProvisioningState::FetchSerial));
        assert!(!report.visited(ProvisioningState::Lock));
    }

    #[test]
    fn test_new_rejects_missing_key() {
        use crate::transport::TcpConnector;
        let connector = Arc::new(TcpConnector::new("127.0.0.1:1"));
        assert!(Provisioner::new(ProvisionConfig::default(), connector).is_err());
    }
}
