//! Framing error types.

use thiserror::Error;

/// Errors that can occur while decoding frames or length-delimited messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// An escape byte was followed by something other than `ESC_END` or `ESC_ESC`.
    #[error("invalid escape sequence at offset {offset}: 0xDB 0x{byte:02X}")]
    InvalidEscape {
        /// Offset of the escape byte within the raw frame.
        offset: usize,
        /// The byte that followed the escape.
        byte: u8,
    },

    /// The frame ended in the middle of an escape sequence.
    #[error("frame ends with a dangling escape byte")]
    DanglingEscape,

    /// A varint used more than ten bytes or does not fit in 64 bits.
    #[error("varint overflows 64 bits")]
    VarintOverflow,

    /// A length prefix declared a message larger than the configured limit.
    #[error("message too large: maximum {max} bytes, prefix declares {size}")]
    MessageTooLarge {
        /// Declared message size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },
}

/// Result type alias for framing operations.
pub type FrameResult<T> = Result<T, FrameError>;
