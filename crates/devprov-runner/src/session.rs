//! A device session: channels, dispatcher and the current link.
//!
//! The session outlives individual connections. Reconnecting replaces the
//! link but keeps the registered channels, so the serial number fetched before
//! a restart stays known afterwards.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use devprov_fwinfo::FwInfoCodec;
use devprov_settings::Settings;

use crate::channels::{FwInfoChannel, SettingsChannel};
use crate::config::MuxAddresses;
use crate::dispatcher::Dispatcher;
use crate::error::LinkError;
use crate::link::Link;
use crate::transport::Connector;

/// Read request on the settings channel.
const READ_REQUEST: &[u8] = b"{}";

/// Talks to one device across connections.
pub struct DeviceSession {
    connector: Arc<dyn Connector>,
    addresses: MuxAddresses,
    dispatcher: Dispatcher,
    settings: Arc<SettingsChannel>,
    fwinfo: Arc<FwInfoChannel>,
    link: Option<Link>,
}

impl DeviceSession {
    /// Create a session and register its channel handlers.
    pub fn new(
        connector: Arc<dyn Connector>,
        addresses: MuxAddresses,
        codec: Arc<dyn FwInfoCodec>,
    ) -> Self {
        let dispatcher = Dispatcher::new();
        let settings = SettingsChannel::new();
        settings.attach(&dispatcher, addresses.settings);
        let fwinfo = FwInfoChannel::new(codec);
        fwinfo.attach(&dispatcher, addresses.fwinfo);

        DeviceSession {
            connector,
            addresses,
            dispatcher,
            settings,
            fwinfo,
            link: None,
        }
    }

    /// Human-readable endpoint, for logs.
    pub fn endpoint(&self) -> String {
        self.connector.describe()
    }

    /// Open a new connection, closing any previous one.
    pub async fn connect(&mut self) -> std::io::Result<()> {
        self.disconnect().await;
        let link = Link::open(self.connector.as_ref(), self.dispatcher.clone()).await?;
        self.settings.reset();
        self.link = Some(link);
        Ok(())
    }

    /// Close the current connection, if any.
    pub async fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            debug!("Closing connection to {}", self.connector.describe());
            link.close().await;
        }
    }

    /// Whether a link is open and its peer has not closed it.
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|link| !link.is_closed())
    }

    fn link(&mut self) -> Result<&mut Link, LinkError> {
        self.link.as_mut().ok_or(LinkError::NotConnected)
    }

    /// Send a payload on a mux channel.
    pub async fn send(&mut self, address: u8, payload: &[u8]) -> Result<(), LinkError> {
        self.link()?.send(address, payload).await
    }

    /// Read the settings snapshot.
    ///
    /// `Ok(None)` means no usable reply within `timeout`.
    pub async fn read_settings(&mut self, timeout: Duration) -> Result<Option<Settings>, LinkError> {
        let pending = self.settings.expect_response();
        let address = self.addresses.settings;
        self.send(address, READ_REQUEST).await?;
        Ok(pending.wait(timeout).await.flatten())
    }

    /// Write a settings object. No reply is awaited.
    pub async fn write_settings(&mut self, settings: &Settings) -> Result<(), LinkError> {
        let payload = serde_json::to_vec(settings)?;
        let address = self.addresses.settings;
        self.send(address, &payload).await
    }

    /// Ask for the serial number and wait up to `timeout` for it.
    ///
    /// Returns immediately if the serial is already known.
    pub async fn fetch_serial(&mut self, timeout: Duration) -> Result<Option<String>, LinkError> {
        if let Some(serial) = self.fwinfo.known_serial() {
            return Ok(Some(serial));
        }
        let request = self.fwinfo.request();
        let address = self.addresses.fwinfo;
        self.send(address, &request).await?;
        Ok(self.fwinfo.serial(timeout).await)
    }

    /// Send the restart command on the service channel. No reply is expected.
    pub async fn send_restart(&mut self, command: &[u8]) -> Result<(), LinkError> {
        let address = self.addresses.service;
        self.send(address, command).await
    }
}
