//! Passive link monitor.
//!
//! Opens the link, optionally sends one raw SLIP-encoded message, then logs
//! every frame the device emits until the connection closes.

use tracing::info;

use slipmux_frame::encode;

use crate::dispatcher::{hex_preview, Dispatcher};
use crate::error::Result;
use crate::link::Link;
use crate::transport::Connector;

/// Default initial message (hex).
pub const DEFAULT_INIT_HEX: &str = "2A0A0A";

/// Payload as text if it is printable UTF-8, otherwise as hex.
fn render_payload(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.is_empty() && text.chars().all(|c| !c.is_control() || c == '\n') => {
            text.to_string()
        }
        _ => hex_preview(payload),
    }
}

fn log_frame(address: u8, payload: &[u8]) {
    info!(
        address = %format!("{:#04x}", address),
        len = payload.len(),
        "{}",
        render_payload(payload)
    );
}

/// Monitor the link until the peer closes it.
///
/// `init`, if given, is SLIP-encoded as-is (no mux address is prepended) and
/// written once after connecting.
pub async fn run_monitor(connector: &dyn Connector, init: Option<&[u8]>) -> Result<()> {
    let dispatcher = Dispatcher::new();
    dispatcher.observe(log_frame);

    info!("Monitoring {}", connector.describe());
    let mut link = Link::open(connector, dispatcher).await?;

    if let Some(init) = init {
        info!("Sending initial message: {}", hex::encode(init));
        link.send_raw(&encode(init)).await?;
    }

    link.closed().await;
    info!("Connection closed");
    Ok(())
}
