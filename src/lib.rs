//! Pull-style decoding core for animated GIF (87a/89a) streams.
//!
//! The decoder takes a complete or partially complete GIF file already
//! resident in memory and delivers each frame to a [`FrameSink`] as raw
//! palette indices together with its rectangle, palette, transparency,
//! timing, disposal mode and interlace flag. Compositing, RGB conversion,
//! interlace reordering and I/O are the caller's business; the
//! [`interlace`] module has a helper for the row reordering.
//!
//! ## Decoding
//!
//! ```
//! use gifdec::{decode, FrameInfo, SinkFn};
//!
//! // A 1x1 two-color GIF.
//! let data: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\
//!                     \xff\xff\xff\x00\x00\x00\
//!                     \x2c\x00\x00\x00\x00\x01\x00\x01\x00\x00\
//!                     \x02\x02\x44\x01\x00\x3b";
//!
//! let mut pixels = Vec::new();
//! let mut sink = SinkFn(|frame: &FrameInfo<'_>| pixels = frame.pixels.to_vec());
//! let summary = decode(data, &mut sink, 0)?;
//! assert_eq!(summary.frames_delivered, 1);
//! assert_eq!(pixels, [0]);
//! # Ok::<(), gifdec::GifError>(())
//! ```
//!
//! ## Partial input and resumption
//!
//! A stream that breaks mid-way still delivers every frame that completed
//! before the break, with [`DecodeSummary::truncated`] set. There is no
//! seek table in GIF, so resuming after more bytes arrive means re-parsing
//! from the start with `skip` set to the number of frames already handled;
//! the skipped frames are parsed but not delivered again.

#![warn(missing_docs)]

mod decoder;
mod error;
mod frame;
mod lzw;
mod pool;
mod reader;

pub mod interlace;

pub use decoder::{decode, decode_frames, decode_with_pool, DecodeSummary, Version};
pub use error::{GifError, Result};
pub use frame::{
    DisposalMethod, FrameInfo, FrameSink, GifFrame, MetadataInfo, Palette, SinkFn,
};
pub use pool::{BufferPool, HeapPool};
