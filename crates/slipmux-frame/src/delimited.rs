//! Varint length-delimited message reassembly.
//!
//! Binary messages carried over a plain byte stream are sent as:
//!
//! ```text
//! +----------------+---------------------------+
//! | varint length  | message bytes [0..length] |
//! +----------------+---------------------------+
//! ```
//!
//! The reassembler accepts arbitrary chunks and yields whole messages once both
//! the prefix and the declared number of bytes are buffered.

use bytes::{Buf, Bytes, BytesMut};

use crate::varint::decode_varint;
use crate::{FrameError, FrameResult};

/// Default upper bound on a single message (64 KiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Reassembles varint length-prefixed messages from a byte stream.
#[derive(Debug)]
pub struct LengthDelimited {
    /// Bytes not yet consumed as complete messages.
    buffer: BytesMut,
    /// Largest message a prefix may declare.
    max_message_size: usize,
}

impl Default for LengthDelimited {
    fn default() -> Self {
        Self::new()
    }
}

impl LengthDelimited {
    /// Create a reassembler with the default size limit.
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a reassembler with a custom size limit.
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        LengthDelimited {
            buffer: BytesMut::with_capacity(1024),
            max_message_size,
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to take the next complete message from the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed. On error (oversized
    /// prefix or malformed varint) the buffer is discarded, since the stream
    /// offers no way to find the next message boundary.
    pub fn next_message(&mut self) -> FrameResult<Option<Bytes>> {
        let (size, prefix_len) = match decode_varint(&self.buffer) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.buffer.clear();
                return Err(e);
            }
        };

        if size > self.max_message_size as u64 {
            self.buffer.clear();
            return Err(FrameError::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }

        let size = size as usize;
        if self.buffer.len() < prefix_len + size {
            return Ok(None);
        }

        self.buffer.advance(prefix_len);
        Ok(Some(self.buffer.split_to(size).freeze()))
    }

    /// Append `data` and hand every completed message to `consumer`, in order.
    ///
    /// Returns the number of messages delivered by this call.
    pub fn feed<F>(&mut self, data: &[u8], mut consumer: F) -> FrameResult<usize>
    where
        F: FnMut(Bytes),
    {
        self.push(data);
        let mut delivered = 0;
        while let Some(message) = self.next_message()? {
            consumer(message);
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Prefix `message` with its varint length.
pub fn encode_delimited(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 3);
    crate::varint::encode_varint(message.len() as u64, &mut out);
    out.extend_from_slice(message);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_message() {
        let mut reassembler = LengthDelimited::new();
        let mut got = Vec::new();
        let n = reassembler
            .feed(&encode_delimited(b"hello"), |m| got.push(m))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(got, vec![Bytes::from_static(b"hello")]);
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn test_incomplete_prefix_waits() {
        let mut reassembler = LengthDelimited::new();
        let message = vec![0xAB; 300];
        let wire = encode_delimited(&message);

        // First byte of a two-byte prefix.
        assert_eq!(reassembler.feed(&wire[..1], |_| {}).unwrap(), 0);
        // Prefix complete, payload incomplete.
        assert_eq!(reassembler.feed(&wire[1..100], |_| {}).unwrap(), 0);

        let mut got = Vec::new();
        assert_eq!(reassembler.feed(&wire[100..], |m| got.push(m)).unwrap(), 1);
        assert_eq!(got[0].len(), 300);
    }

    #[test]
    fn test_multiple_messages_in_one_chunk() {
        let mut reassembler = LengthDelimited::new();
        let mut wire = encode_delimited(b"one");
        wire.extend(encode_delimited(b""));
        wire.extend(encode_delimited(b"three"));
        wire.extend_from_slice(&[0x05, b'p']);

        let mut got = Vec::new();
        assert_eq!(reassembler.feed(&wire, |m| got.push(m)).unwrap(), 3);
        assert_eq!(&got[0][..], b"one");
        assert!(got[1].is_empty());
        assert_eq!(&got[2][..], b"three");
        assert_eq!(reassembler.buffered_len(), 2);
    }

    #[test]
    fn test_oversize_rejected_and_buffer_discarded() {
        let mut reassembler = LengthDelimited::with_max_message_size(16);
        let wire = encode_delimited(&[0u8; 17]);

        let err = reassembler.feed(&wire, |_| {}).unwrap_err();
        assert_eq!(err, FrameError::MessageTooLarge { size: 17, max: 16 });
        assert_eq!(reassembler.buffered_len(), 0);

        // The stream starts fresh afterwards.
        let mut got = Vec::new();
        reassembler.feed(&encode_delimited(b"ok"), |m| got.push(m)).unwrap();
        assert_eq!(&got[0][..], b"ok");
    }

    #[test]
    fn test_malformed_varint_rejected() {
        let mut reassembler = LengthDelimited::new();
        let err = reassembler.feed(&[0xFF; 12], |_| {}).unwrap_err();
        assert_eq!(err, FrameError::VarintOverflow);
        assert_eq!(reassembler.buffered_len(), 0);
    }
}
