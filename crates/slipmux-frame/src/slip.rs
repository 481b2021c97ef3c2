//! SLIP-style escaping and frame encoding.
//!
//! The device firmware uses a newline as the frame terminator rather than the
//! RFC 1055 `0xC0`, so that the console stays readable when a terminal is
//! attached to the same UART.

use bytes::Bytes;

use crate::{FrameError, FrameResult};

// ============================================================================
// Constants
// ============================================================================

/// Frame terminator.
pub const END: u8 = 0x0A;
/// Escape marker.
pub const ESC: u8 = 0xDB;
/// Second byte of the escape sequence for a literal `END`.
pub const ESC_END: u8 = 0xDC;
/// Second byte of the escape sequence for a literal `ESC`.
pub const ESC_ESC: u8 = 0xDD;

// ============================================================================
// Escaping
// ============================================================================

/// Escape `data` and append the trailing terminator.
///
/// Every `ESC` becomes `ESC ESC_ESC` and every `END` becomes `ESC ESC_END`.
/// The escape marker is handled first in the sense that bytes produced by the
/// `END` substitution are never themselves re-escaped.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8 + 1);
    for &byte in data {
        match byte {
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            END => out.extend_from_slice(&[ESC, ESC_END]),
            _ => out.push(byte),
        }
    }
    out.push(END);
    out
}

/// Unescape a raw frame, tolerating malformed escapes.
///
/// Leading and trailing terminators are stripped first. An escape marker that
/// is not followed by `ESC_END`/`ESC_ESC` is copied through unchanged.
pub fn decode(data: &[u8]) -> Vec<u8> {
    unescape(strip_terminators(data), false).unwrap_or_default()
}

/// Unescape a raw frame, rejecting malformed escapes.
pub fn decode_strict(data: &[u8]) -> FrameResult<Vec<u8>> {
    unescape(strip_terminators(data), true)
}

fn strip_terminators(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|&b| b != END).unwrap_or(data.len());
    let end = data.iter().rposition(|&b| b != END).map_or(start, |i| i + 1);
    &data[start..end]
}

fn unescape(data: &[u8], strict: bool) -> FrameResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        if byte != ESC {
            out.push(byte);
            i += 1;
            continue;
        }
        match data.get(i + 1) {
            Some(&ESC_ESC) => out.push(ESC),
            Some(&ESC_END) => out.push(END),
            Some(&other) if strict => {
                return Err(FrameError::InvalidEscape { offset: i, byte: other });
            }
            Some(&other) => out.extend_from_slice(&[ESC, other]),
            None if strict => return Err(FrameError::DanglingEscape),
            None => out.push(ESC),
        }
        i += 2;
    }
    Ok(out)
}

// ============================================================================
// Multiplexed Frames
// ============================================================================

/// A decoded frame: the mux address and the channel payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Logical channel address (first decoded byte).
    pub address: u8,
    /// Channel payload.
    pub payload: Bytes,
}

/// Encode a payload for the given mux address, ready to write to the link.
pub fn encode_frame(address: u8, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(payload.len() + 1);
    packet.push(address);
    packet.extend_from_slice(payload);
    encode(&packet)
}

/// Decode one raw frame into address and payload.
///
/// Returns `Ok(None)` for a frame that decodes to zero bytes; such frames are
/// dropped without error.
pub fn decode_frame(raw: &[u8]) -> FrameResult<Option<DecodedFrame>> {
    let mut decoded = Bytes::from(decode_strict(raw)?);
    if decoded.is_empty() {
        return Ok(None);
    }
    let address = decoded[0];
    let payload = decoded.split_off(1);
    Ok(Some(DecodedFrame { address, payload }))
}
