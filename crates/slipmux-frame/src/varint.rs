//! Base-128 variable-length integers.
//!
//! Each byte carries seven value bits, least significant group first; the high
//! bit is set on every byte except the last.

use crate::{FrameError, FrameResult};

/// Maximum encoded length of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Append the varint encoding of `value` to `out`.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Decode a varint from the start of `buf`.
///
/// Returns `Ok(Some((value, bytes_consumed)))`, or `Ok(None)` if `buf` ends
/// before the final byte of the varint.
pub fn decode_varint(buf: &[u8]) -> FrameResult<Option<(u64, usize)>> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(FrameError::VarintOverflow);
        }
        let group = u64::from(byte & 0x7F);
        let shift = 7 * i as u32;
        // The tenth byte may only contribute the single remaining bit.
        if i == MAX_VARINT_LEN - 1 && group > 1 {
            return Err(FrameError::VarintOverflow);
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    Ok(None)
}
