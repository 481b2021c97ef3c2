//! SLIP Multiplexed Framing
//!
//! This crate provides the byte-level framing used on the device's shared serial
//! link. Every logical channel (settings, firmware info, service commands) shares
//! one UART; frames are delimited SLIP-style and the first decoded byte of each
//! frame selects the channel.
//!
//! # Wire Format
//!
//! ```text
//! +------------------------------------------+-----+
//! | escape(address ++ payload)               | END |
//! +------------------------------------------+-----+
//! ```
//!
//! - `END` (`0x0A`) terminates a frame
//! - `ESC` (`0xDB`) introduces a two-byte escape sequence
//! - `ESC ESC_END` represents a literal `END`, `ESC ESC_ESC` a literal `ESC`
//!
//! Binary protocols carried over non-SLIP streams use a varint length prefix
//! instead; see [`LengthDelimited`].
//!
//! # Example
//!
//! ```rust
//! use slipmux_frame::{encode_frame, FrameExtractor};
//!
//! let wire = encode_frame(0x11, b"{}");
//!
//! let mut extractor = FrameExtractor::new();
//! let frames = extractor.push(&wire);
//! let frame = frames[0].as_ref().unwrap();
//! assert_eq!(frame.address, 0x11);
//! assert_eq!(&frame.payload[..], b"{}");
//! ```

mod delimited;
mod error;
mod extractor;
mod slip;
pub mod varint;

pub use delimited::*;
pub use error::*;
pub use extractor::*;
pub use slip::*;
