//! Frame extraction from a byte stream.
//!
//! Bytes arrive from the transport in arbitrary chunks. The extractor keeps
//! whatever follows the last terminator buffered, so frame boundaries do not
//! depend on how the input was split.

use bytes::BytesMut;

use crate::{decode_frame, DecodedFrame, FrameResult, END};

/// Initial buffer capacity.
const INITIAL_CAPACITY: usize = 1024;

/// Splits a stream into terminated frames and decodes them.
#[derive(Debug)]
pub struct FrameExtractor {
    /// Bytes received after the last terminator.
    buffer: BytesMut,
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameExtractor {
    /// Create an empty extractor.
    pub fn new() -> Self {
        FrameExtractor {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append received data and decode every frame it completes.
    ///
    /// Results are in stream order. A frame that fails to decode yields an
    /// `Err` in its position and does not affect the frames around it. Frames
    /// that decode to zero bytes are skipped.
    pub fn push(&mut self, data: &[u8]) -> Vec<FrameResult<DecodedFrame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(raw) = self.next_raw() {
            match decode_frame(&raw) {
                Ok(Some(frame)) => frames.push(Ok(frame)),
                Ok(None) => {}
                Err(e) => frames.push(Err(e)),
            }
        }
        frames
    }

    /// Remove the next raw frame, terminator included, if one is complete.
    pub fn next_raw(&mut self) -> Option<BytesMut> {
        let end = self.buffer.iter().position(|&b| b == END)?;
        Some(self.buffer.split_to(end + 1))
    }

    /// Get the number of buffered bytes awaiting a terminator.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any partial frame (e.g. after the transport is reopened).
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
