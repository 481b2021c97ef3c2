//! Device Provisioning Runner
//!
//! Drives an embedded device through first-time provisioning over a
//! SLIP-multiplexed serial link (usually reached through a TCP bridge):
//!
//! 1. read the settings and check whether the device is locked
//! 2. install the access key and lock the settings (unlocked devices only)
//! 3. fetch the serial number from the firmware-info channel
//! 4. upload signed settings bound to that serial and verify them
//! 5. restart the device and wait for it to come back
//!
//! The building blocks are usable on their own:
//!
//! - [`transport`]: the [`Connector`] seam and the TCP implementation
//! - [`link`]: one open connection with its frame reader task
//! - [`dispatcher`]: per-address fan-out of decoded frames
//! - [`correlator`]: single-slot request/response rendezvous
//! - [`session`]: channels plus the current link, across reconnects
//! - [`orchestrator`]: the provisioning state machine
//! - [`monitor`]: passive frame logger

pub mod channels;
pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod link;
pub mod monitor;
pub mod orchestrator;
pub mod session;
pub mod transport;

pub use config::{HexBytes, MuxAddresses, ProvisionConfig, TimingConfig};
pub use error::{ConfigError, HandlerError, LinkError, Result, RunnerError};
pub use orchestrator::{FailureReason, Outcome, ProvisioningReport, ProvisioningState, Provisioner};
pub use session::DeviceSession;
pub use transport::{BoxedStream, ByteStream, Connector, TcpConnector};
