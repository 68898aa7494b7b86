//! Variable-width LZW decompression for GIF image data.
//!
//! Codes are packed LSB-first across the bytes of a sub-block chain. The
//! code width starts at `minimum code size + 1` bits and grows up to 12 as
//! dictionary entries are assigned. Two codes are reserved: CLEAR (resets
//! the dictionary) and END (terminates the stream).

use crate::error::{GifError, Result};
use crate::reader::SubBlockReader;

/// Dictionary capacity; codes are at most 12 bits wide.
pub(crate) const MAX_CODES: usize = 4096;

const MAX_CODE_WIDTH: u32 = 12;

/// LZW dictionary storage, borrowed from the session workspace.
///
/// Each assigned entry is a `(previous code, last byte)` pair; emitting a
/// string walks the previous-code chain and reverses it through `stack`.
/// The prefix table holds one little-endian `u16` per entry.
pub(crate) struct Dict<'w> {
    prefix: &'w mut [u8],
    suffix: &'w mut [u8],
    stack: &'w mut [u8],
}

impl<'w> Dict<'w> {
    pub fn new(prefix: &'w mut [u8], suffix: &'w mut [u8], stack: &'w mut [u8]) -> Self {
        debug_assert!(prefix.len() >= MAX_CODES * 2);
        debug_assert!(suffix.len() >= MAX_CODES);
        debug_assert!(stack.len() >= MAX_CODES);
        Self {
            prefix,
            suffix,
            stack,
        }
    }

    fn prev(&self, code: u16) -> u16 {
        let i = code as usize * 2;
        u16::from_le_bytes([self.prefix[i], self.prefix[i + 1]])
    }

    fn link(&mut self, code: u16, prev: u16, byte: u8) {
        let i = code as usize * 2;
        self.prefix[i..i + 2].copy_from_slice(&prev.to_le_bytes());
        self.suffix[code as usize] = byte;
    }
}

/// How the sub-block chain ended.
pub(crate) enum ChainEnd {
    /// The zero-length terminator block was consumed.
    Terminated,
    /// The input buffer ran out inside the chain; the cursor is unusable.
    Truncated,
}

pub(crate) struct LzwOutcome {
    /// Number of output bytes written; less than the output length when the
    /// stream ended early.
    pub filled: usize,
    pub chain: ChainEnd,
}

/// Decompress one image's LZW stream into `out`.
///
/// Surplus codes after the output fills are tolerated and discarded until
/// the chain closes. An under-filled output is reported through
/// [`LzwOutcome::filled`], not as an error; the caller delivers the partial
/// frame and flags truncation.
pub(crate) fn decompress(
    min_code_size: u8,
    blocks: &mut SubBlockReader<'_, '_>,
    out: &mut [u8],
    dict: &mut Dict<'_>,
) -> Result<LzwOutcome> {
    if !(1..=8).contains(&min_code_size) {
        return Err(GifError::LzwCorrupt {
            code: u16::from(min_code_size),
        });
    }
    let clear: u16 = 1 << min_code_size;
    let end: u16 = clear + 1;

    let mut width = u32::from(min_code_size) + 1;
    let mut next_free: u16 = clear + 2;
    // Code emitted last, and the first byte of its string; cleared on CLEAR.
    let mut prev: Option<u16> = None;
    let mut last_first: u8 = 0;

    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut filled = 0usize;

    loop {
        // Assemble the next LSB-first code across sub-block boundaries.
        while bits < width {
            match blocks.next_byte()? {
                Some(byte) => {
                    acc |= u32::from(byte) << bits;
                    bits += 8;
                }
                // Chain closed without an END code: deliver what we have.
                None => return Ok(LzwOutcome { filled, chain: ChainEnd::Terminated }),
            }
        }
        let code = (acc & ((1 << width) - 1)) as u16;
        acc >>= width;
        bits -= width;

        if code == clear {
            width = u32::from(min_code_size) + 1;
            next_free = clear + 2;
            prev = None;
            continue;
        }
        if code == end {
            return drain(blocks, filled);
        }

        let first = match prev {
            None => {
                // The first code after a clear carries no dictionary context
                // and must be a plain literal.
                if code >= clear {
                    return Err(GifError::LzwCorrupt { code });
                }
                push_pixel(out, &mut filled, code as u8);
                code as u8
            }
            Some(prev_code) => {
                let emitted = if code < next_free {
                    code
                } else if code == next_free && next_free < MAX_CODES as u16 {
                    // The KwKwK case: the entry being defined is also the
                    // one emitted, ending in the first byte of the previous
                    // string.
                    dict.link(next_free, prev_code, last_first);
                    code
                } else {
                    return Err(GifError::LzwCorrupt { code });
                };
                let first = emit(dict, emitted, clear, out, &mut filled)?;
                if code < next_free && next_free < MAX_CODES as u16 {
                    dict.link(next_free, prev_code, first);
                }
                if next_free < MAX_CODES as u16 {
                    next_free += 1;
                    if u32::from(next_free) == 1 << width && width < MAX_CODE_WIDTH {
                        width += 1;
                    }
                }
                first
            }
        };
        last_first = first;
        prev = Some(code);

        if filled == out.len() {
            return drain(blocks, filled);
        }
    }
}

/// Emit the string for an assigned code or literal, returning its first byte.
fn emit(
    dict: &mut Dict<'_>,
    code: u16,
    clear: u16,
    out: &mut [u8],
    filled: &mut usize,
) -> Result<u8> {
    if code < clear {
        push_pixel(out, filled, code as u8);
        return Ok(code as u8);
    }

    // Walk the previous-code chain tail-first into the reversal stack.
    // Links always point at earlier codes, so the walk is finite; the depth
    // check guards against a corrupted table.
    let mut depth = 0usize;
    let mut cur = code;
    while cur >= clear {
        if depth >= dict.stack.len() {
            return Err(GifError::LzwCorrupt { code });
        }
        dict.stack[depth] = dict.suffix[cur as usize];
        depth += 1;
        cur = dict.prev(cur);
    }

    let first = cur as u8;
    push_pixel(out, filled, first);
    for i in (0..depth).rev() {
        push_pixel(out, filled, dict.stack[i]);
    }
    Ok(first)
}

/// Write one output byte, silently discarding overflow past the frame size.
fn push_pixel(out: &mut [u8], filled: &mut usize, byte: u8) {
    if *filled < out.len() {
        out[*filled] = byte;
        *filled += 1;
    }
}

/// Consume the rest of the chain after END or a full output buffer.
fn drain(blocks: &mut SubBlockReader<'_, '_>, filled: usize) -> Result<LzwOutcome> {
    let chain = match blocks.skip_chain() {
        Ok(()) => ChainEnd::Terminated,
        Err(_) => ChainEnd::Truncated,
    };
    Ok(LzwOutcome { filled, chain })
}
