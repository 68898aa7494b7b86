//! Error types for GIF decoding.

use thiserror::Error;

/// Errors produced while decoding a GIF stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GifError {
    /// The first six bytes are not a recognized GIF signature.
    #[error("Bad GIF signature")]
    BadSignature,

    /// The input ended in the middle of a block structure.
    #[error("Truncated GIF stream at offset {offset}")]
    Truncated {
        /// Byte offset at which more data was needed.
        offset: usize,
    },

    /// The LZW image stream referenced a code outside the assigned
    /// dictionary, or carried an invalid minimum code size.
    #[error("Corrupt LZW stream: code {code}")]
    LzwCorrupt {
        /// The offending code (or minimum code size).
        code: u16,
    },

    /// A byte other than extension, image descriptor or trailer appeared
    /// where a block introducer was expected.
    #[error("Unexpected block introducer {byte:#04x} at offset {offset}")]
    UnexpectedIntroducer {
        /// The introducer byte that was read.
        byte: u8,
        /// Byte offset of the introducer.
        offset: usize,
    },

    /// The buffer pool could not supply a working buffer.
    #[error("Buffer pool failed to supply {len} bytes")]
    AllocFailed {
        /// Requested buffer length.
        len: usize,
    },
}

/// GIF decoding result type.
pub type Result<T> = std::result::Result<T, GifError>;
