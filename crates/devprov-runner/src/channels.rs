//! Per-channel receive state.
//!
//! Each channel owns the decoding state for its mux address and the slot that
//! hands results to the workflow. Channels outlive individual connections.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use devprov_fwinfo::FwInfoCodec;
use devprov_settings::{JsonReassembler, Settings};

use crate::correlator::{Correlator, OnceSlot, PendingResponse};
use crate::dispatcher::{Dispatcher, HandlerResult};

// ============================================================================
// Settings
// ============================================================================

/// Settings channel: reassembles JSON replies and hands them to the waiter.
///
/// A reply that parsed to something other than a JSON object resolves the
/// wait with `None`, so the caller fails fast instead of timing out.
pub struct SettingsChannel {
    reassembler: Mutex<JsonReassembler>,
    responses: Correlator<Option<Settings>>,
}

impl SettingsChannel {
    /// Create a channel with an empty reassembler.
    pub fn new() -> Arc<Self> {
        Arc::new(SettingsChannel {
            reassembler: Mutex::new(JsonReassembler::new()),
            responses: Correlator::new(),
        })
    }

    /// Register this channel's handler on `address`.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher, address: u8) {
        let channel = self.clone();
        dispatcher.register(address, move |payload: Bytes| {
            let channel = channel.clone();
            async move {
                channel.on_payload(&payload);
                Ok(())
            }
        });
    }

    /// Feed one inbound payload.
    pub fn on_payload(&self, payload: &[u8]) {
        let completed = self.reassembler.lock().push(payload);
        for snapshot in completed {
            if !self.responses.fulfill(snapshot) {
                debug!("Settings response arrived with no request pending");
            }
        }
    }

    /// Arm a wait for the next complete reply. Call before sending the request.
    pub fn expect_response(&self) -> PendingResponse<Option<Settings>> {
        self.responses.arm()
    }

    /// Drop any partially received reply.
    pub fn reset(&self) {
        self.reassembler.lock().reset();
    }
}

// ============================================================================
// Firmware info
// ============================================================================

/// Firmware-info channel: extracts the device serial number.
pub struct FwInfoChannel {
    codec: Arc<dyn FwInfoCodec>,
    serial: OnceSlot<String>,
}

impl FwInfoChannel {
    /// Create a channel using `codec` for the firmware-info schema.
    pub fn new(codec: Arc<dyn FwInfoCodec>) -> Arc<Self> {
        Arc::new(FwInfoChannel {
            codec,
            serial: OnceSlot::new(),
        })
    }

    /// Register this channel's handler on `address`.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher, address: u8) {
        let channel = self.clone();
        dispatcher.register(address, move |payload: Bytes| {
            let channel = channel.clone();
            async move { channel.on_payload(&payload) }
        });
    }

    /// Feed one inbound payload.
    pub fn on_payload(&self, payload: &[u8]) -> HandlerResult {
        match self.codec.decode_serial(payload)? {
            Some(serial) => {
                info!("Device serial number: {}", serial);
                if !self.serial.fulfill(serial) {
                    debug!("Serial number already known, ignoring repeat");
                }
            }
            None => error!("Got response but no dev_info field."),
        }
        Ok(())
    }

    /// Request payload for the read-device-info command.
    pub fn request(&self) -> Vec<u8> {
        self.codec.encode_request()
    }

    /// Wait up to `timeout` for the serial number.
    pub async fn serial(&self, timeout: Duration) -> Option<String> {
        self.serial.wait(timeout).await
    }

    /// The serial number, if already received.
    pub fn known_serial(&self) -> Option<String> {
        self.serial.get()
    }
}
