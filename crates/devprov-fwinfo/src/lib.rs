//! Firmware Info Channel
//!
//! The firmware-info channel (mux address `0x12` by default) answers queries
//! about the running firmware and the device identity. Messages use the
//! protobuf wire format:
//!
//! ```text
//! CommandMessage {
//!     1: Request  req { 1: Command cmd }
//!     2: Response res { 1: DeviceInfo dev_info { 1: string serial_number } }
//! }
//! ```
//!
//! The messages are declared with `prost`. Provisioning only needs the device
//! serial, so the rest of the firmware's schema is left out and skipped on
//! decode. Callers go through the [`FwInfoCodec`] trait.
//!
//! # Example
//!
//! ```rust
//! use devprov_fwinfo::{FwInfoCodec, ProtoFwInfoCodec};
//!
//! let codec = ProtoFwInfoCodec;
//! assert_eq!(codec.encode_request(), vec![0x0A, 0x02, 0x08, 0x01]);
//! let reply = ProtoFwInfoCodec::encode_device_info("ABC123");
//! assert_eq!(codec.decode_serial(&reply).unwrap(), Some("ABC123".to_string()));
//! ```

mod codec;
mod error;
mod messages;

pub use codec::*;
pub use error::*;
pub use messages::*;
