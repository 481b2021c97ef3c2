//! Device Settings Channel
//!
//! This crate implements the host side of the device's JSON settings channel:
//!
//! - [`JsonReassembler`]: rebuilds a JSON object delivered across several frames
//! - [`verify`]: checks a read-back snapshot against the values that were written
//! - [`SettingsAuthorizer`]: wraps settings in a signed envelope that a locked
//!   device will accept
//!
//! # Protocol Overview
//!
//! - **Read**: the host sends `{}`; the device answers with its full settings object
//! - **Write**: the host sends an object of keys to change. The reserved keys
//!   `save` and `reset` request actions instead of being stored
//! - **Signed write**: once locked, the device only accepts
//!   `{"cnt": base64(json), "sig": base64(tag)}`, where the JSON embeds the
//!   device serial under `sn`
//!
//! # Example
//!
//! ```rust,ignore
//! use devprov_settings::{SettingsAuthorizer, JsonReassembler};
//!
//! let authorizer = SettingsAuthorizer::new(&key)?;
//! let envelope = authorizer.sign(&settings, "ABC123")?;
//! let request = envelope.into_request(&settings);
//!
//! let mut reassembler = JsonReassembler::new();
//! for snapshot in reassembler.push(chunk) { /* ... */ }
//! ```

mod authorizer;
mod error;
mod reassembler;
mod types;
mod verify;

pub use authorizer::*;
pub use error::*;
pub use reassembler::*;
pub use types::*;
pub use verify::*;
