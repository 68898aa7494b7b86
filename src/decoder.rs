//! GIF block parser and decode session.
//!
//! The stream is walked twice. A structural pre-scan skips over every block
//! without decompressing anything, establishing the frame count and whether
//! the input is truncated; the decode pass then parses for real, feeding
//! each image's sub-block chain through the LZW decompressor and invoking
//! the sink. Two passes keep the frame count in every callback exact even
//! for broken files, at the cost of one cheap extra walk.

use crate::error::{GifError, Result};
use crate::frame::{DisposalMethod, FrameInfo, FrameSink, GifFrame, MetadataInfo, Palette};
use crate::lzw::{self, ChainEnd, Dict};
use crate::pool::{BufferPool, HeapPool};
use crate::reader::{skip_sub_blocks, SliceReader, SubBlockReader};

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_SEPARATOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;

const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
const APPLICATION_LABEL: u8 = 0xFF;

/// Shortest possible GIF: six signature bytes plus the seven-byte logical
/// screen descriptor.
const MIN_GIF_LEN: usize = 13;

/// Application extension headers are always eleven bytes.
const APPLICATION_HEADER_LEN: usize = 11;

/// Palette storage: 256 entries, four bytes apart.
const PALETTE_BYTES: usize = 256 * 4;

const DICT_PREFIX_BYTES: usize = lzw::MAX_CODES * 2;
const DICT_SUFFIX_BYTES: usize = lzw::MAX_CODES;
const DICT_STACK_BYTES: usize = lzw::MAX_CODES;

/// GIF signature version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// The original 1987 format.
    Gif87a,
    /// The 1989 revision with extension blocks.
    Gif89a,
}

/// What a decode call accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Frames delivered to the sink, after the skip threshold.
    pub frames_delivered: usize,
    /// Frames fully parsed, including skipped ones.
    pub frames_seen: usize,
    /// True when the stream ended early or a frame failed to decode;
    /// frames completed before the failure were still delivered.
    pub truncated: bool,
    /// The signature the stream carried.
    pub version: Version,
}

/// Decode a GIF resident in memory, delivering frames to `sink`.
///
/// The first `skip` frames are parsed but not delivered, which is how a
/// caller resumes after re-reading a growing file: pass the number of
/// frames already handled. Returns a hard error only when no frame could
/// ever be produced (bad signature, input shorter than a screen
/// descriptor, allocation failure); a stream that breaks mid-way returns
/// `Ok` with [`DecodeSummary::truncated`] set and the completed frames
/// already delivered.
pub fn decode<S: FrameSink>(data: &[u8], sink: &mut S, skip: usize) -> Result<DecodeSummary> {
    decode_with_pool(data, sink, skip, &mut HeapPool)
}

/// [`decode`] with an explicit working-buffer pool.
#[tracing::instrument(level = "trace", skip_all, fields(len = data.len(), skip = skip))]
pub fn decode_with_pool<S: FrameSink, P: BufferPool>(
    data: &[u8],
    sink: &mut S,
    skip: usize,
    pool: &mut P,
) -> Result<DecodeSummary> {
    if data.len() < MIN_GIF_LEN {
        return Err(GifError::Truncated { offset: data.len() });
    }

    let mut cursor = SliceReader::new(data);
    let header = parse_header(&mut cursor)?;
    let (frames_total, scan_truncated) = scan_frames(cursor.clone());
    let frame_count = if scan_truncated {
        -(frames_total as i32)
    } else {
        frames_total as i32
    };
    tracing::debug!(
        width = header.width,
        height = header.height,
        frames = frames_total,
        truncated = scan_truncated,
        "scanned stream"
    );

    let pixel_len = checked_area(header.width, header.height)?;
    let ws = Workspace::acquire(pool, pixel_len)?;
    let mut session = Session {
        data,
        cursor,
        version: header.version,
        screen_width: header.width,
        screen_height: header.height,
        background_color_index: header.background_color_index,
        global_table: header.global_table,
        ws,
        palette_len: 0,
        transparent_index: None,
        delay: 0,
        disposal: DisposalMethod::None,
        frames_seen: 0,
        frames_delivered: 0,
        frame_count,
        truncated: scan_truncated,
    };

    let outcome = session.run(sink, skip, pool);
    session.ws.release(pool);
    outcome
}

/// Decode every frame into owned storage.
///
/// Convenience wrapper over [`decode`] for callers that want the frames
/// rather than a streaming sink. Truncated streams yield the frames that
/// completed; the loss is only visible through the sink API's summary.
pub fn decode_frames(data: &[u8]) -> Result<Vec<GifFrame>> {
    struct Collector {
        frames: Vec<GifFrame>,
    }

    impl FrameSink for Collector {
        fn on_frame(&mut self, frame: &FrameInfo<'_>) {
            self.frames.push(GifFrame::from(frame));
        }
    }

    let mut collector = Collector { frames: Vec::new() };
    decode(data, &mut collector, 0)?;
    Ok(collector.frames)
}

struct Header<'a> {
    version: Version,
    width: u16,
    height: u16,
    background_color_index: u8,
    /// Raw RGB bytes and entry count of the global color table.
    global_table: Option<(&'a [u8], usize)>,
}

fn parse_header<'a>(cursor: &mut SliceReader<'a>) -> Result<Header<'a>> {
    let version = match cursor.slice(6)? {
        b"GIF87a" => Version::Gif87a,
        b"GIF89a" => Version::Gif89a,
        _ => return Err(GifError::BadSignature),
    };

    let width = cursor.read_u16_le()?;
    let height = cursor.read_u16_le()?;
    let flags = cursor.read_u8()?;
    let background_color_index = cursor.read_u8()?;
    let _aspect_ratio = cursor.read_u8()?;

    let global_table = if flags & 0x80 != 0 {
        let entries = 1usize << ((flags & 0x07) + 1);
        Some((cursor.slice(3 * entries)?, entries))
    } else {
        None
    };

    Ok(Header {
        version,
        width,
        height,
        background_color_index,
        global_table,
    })
}

/// Structure-only walk over the block loop: counts complete image
/// descriptors and reports whether the walk hit the end of the buffer
/// before the trailer.
fn scan_frames(mut cursor: SliceReader<'_>) -> (usize, bool) {
    let mut frames = 0usize;
    loop {
        let Ok(introducer) = cursor.read_u8() else {
            return (frames, true);
        };
        match introducer {
            TRAILER => return (frames, false),
            EXTENSION_INTRODUCER => {
                if cursor.read_u8().is_err() || skip_sub_blocks(&mut cursor).is_err() {
                    return (frames, true);
                }
            }
            IMAGE_SEPARATOR => {
                if skip_image(&mut cursor).is_err() {
                    return (frames, true);
                }
                frames += 1;
            }
            _ => return (frames, true),
        }
    }
}

fn skip_image(cursor: &mut SliceReader<'_>) -> Result<()> {
    cursor.skip(8)?; // x, y, width, height
    let flags = cursor.read_u8()?;
    if flags & 0x80 != 0 {
        cursor.skip(3 << ((flags & 0x07) + 1))?;
    }
    cursor.read_u8()?; // LZW minimum code size
    skip_sub_blocks(cursor)
}

fn checked_area(width: u16, height: u16) -> Result<usize> {
    usize::try_from(u64::from(width) * u64::from(height))
        .map_err(|_| GifError::AllocFailed { len: usize::MAX })
}

/// Scratch buffers for one decode call, all pool-acquired and all returned
/// before the entry point does.
struct Workspace {
    palette: Vec<u8>,
    pixels: Vec<u8>,
    prefix: Vec<u8>,
    suffix: Vec<u8>,
    stack: Vec<u8>,
}

impl Workspace {
    fn acquire<P: BufferPool>(pool: &mut P, pixel_len: usize) -> Result<Self> {
        let sizes = [
            PALETTE_BYTES,
            pixel_len,
            DICT_PREFIX_BYTES,
            DICT_SUFFIX_BYTES,
            DICT_STACK_BYTES,
        ];
        let mut held = Vec::with_capacity(sizes.len());
        for &len in &sizes {
            match pool.acquire(len) {
                Some(buf) if buf.len() >= len => held.push(buf),
                _ => {
                    for buf in held {
                        pool.release(buf);
                    }
                    return Err(GifError::AllocFailed { len });
                }
            }
        }
        match <[Vec<u8>; 5]>::try_from(held) {
            Ok([palette, pixels, prefix, suffix, stack]) => Ok(Self {
                palette,
                pixels,
                prefix,
                suffix,
                stack,
            }),
            Err(held) => {
                for buf in held {
                    pool.release(buf);
                }
                Err(GifError::AllocFailed { len: 0 })
            }
        }
    }

    fn release<P: BufferPool>(self, pool: &mut P) {
        for buf in [self.palette, self.pixels, self.prefix, self.suffix, self.stack] {
            pool.release(buf);
        }
    }
}

enum Step {
    Continue,
    Done,
}

struct Session<'a> {
    data: &'a [u8],
    cursor: SliceReader<'a>,
    version: Version,
    screen_width: u16,
    screen_height: u16,
    background_color_index: u8,
    global_table: Option<(&'a [u8], usize)>,
    ws: Workspace,
    /// Active entries in the palette buffer.
    palette_len: usize,
    // Pending graphic-control state, applied to the next frame only.
    transparent_index: Option<u8>,
    delay: u16,
    disposal: DisposalMethod,
    frames_seen: usize,
    frames_delivered: usize,
    frame_count: i32,
    truncated: bool,
}

impl<'a> Session<'a> {
    fn run<S: FrameSink, P: BufferPool>(
        &mut self,
        sink: &mut S,
        skip: usize,
        pool: &mut P,
    ) -> Result<DecodeSummary> {
        loop {
            match self.step(sink, skip, pool) {
                Ok(Step::Continue) => {}
                Ok(Step::Done) => break,
                Err(err @ GifError::AllocFailed { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, frame = self.frames_seen, "decode halted");
                    self.truncated = true;
                    break;
                }
            }
        }
        Ok(DecodeSummary {
            frames_delivered: self.frames_delivered,
            frames_seen: self.frames_seen,
            truncated: self.truncated,
            version: self.version,
        })
    }

    fn step<S: FrameSink, P: BufferPool>(
        &mut self,
        sink: &mut S,
        skip: usize,
        pool: &mut P,
    ) -> Result<Step> {
        let offset = self.cursor.position();
        let introducer = self.cursor.read_u8()?;
        match introducer {
            TRAILER => Ok(Step::Done),
            EXTENSION_INTRODUCER => {
                self.extension(sink)?;
                Ok(Step::Continue)
            }
            IMAGE_SEPARATOR => self.image(sink, skip, pool),
            byte => Err(GifError::UnexpectedIntroducer { byte, offset }),
        }
    }

    fn extension<S: FrameSink>(&mut self, sink: &mut S) -> Result<()> {
        let label = self.cursor.read_u8()?;
        match label {
            GRAPHIC_CONTROL_LABEL => self.graphic_control(),
            APPLICATION_LABEL => self.application(sink),
            // Comment, plain text and unknown labels carry nothing we
            // surface; their chains are consumed and discarded. Plain
            // text's 12-byte header is itself a length-prefixed block.
            _ => skip_sub_blocks(&mut self.cursor),
        }
    }

    fn graphic_control(&mut self) -> Result<()> {
        let size = self.cursor.read_u8()?;
        if size == 0 {
            return Ok(());
        }
        let block = self.cursor.slice(size as usize)?;
        if block.len() >= 4 {
            let flags = block[0];
            self.disposal = DisposalMethod::from_packed(flags);
            self.delay = u16::from_le_bytes([block[1], block[2]]);
            self.transparent_index = (flags & 0x01 != 0).then_some(block[3]);
        }
        skip_sub_blocks(&mut self.cursor)
    }

    fn application<S: FrameSink>(&mut self, sink: &mut S) -> Result<()> {
        let size = self.cursor.read_u8()?;
        if size as usize != APPLICATION_HEADER_LEN {
            // Nonstandard header length; treat the rest as an ordinary chain.
            if size == 0 {
                return Ok(());
            }
            self.cursor.skip(size as usize)?;
            return skip_sub_blocks(&mut self.cursor);
        }

        let start = self.cursor.position();
        self.cursor.skip(APPLICATION_HEADER_LEN)?;
        skip_sub_blocks(&mut self.cursor)?;

        if sink.wants_metadata() {
            let raw = &self.data[start..self.cursor.position()];
            let meta = MetadataInfo::new(raw, self.frames_seen, self.frame_count);
            tracing::debug!(app = ?meta.app_identifier(), "application extension");
            sink.on_metadata(&meta);
        }
        Ok(())
    }

    fn image<S: FrameSink, P: BufferPool>(
        &mut self,
        sink: &mut S,
        skip: usize,
        pool: &mut P,
    ) -> Result<Step> {
        let x_offset = self.cursor.read_u16_le()?;
        let y_offset = self.cursor.read_u16_le()?;
        let width = self.cursor.read_u16_le()?;
        let height = self.cursor.read_u16_le()?;
        let flags = self.cursor.read_u8()?;
        let interlaced = flags & 0x40 != 0;

        if flags & 0x80 != 0 {
            let entries = 1usize << ((flags & 0x07) + 1);
            let table = self.cursor.slice(3 * entries)?;
            self.load_palette(table, entries);
        } else {
            self.load_global_palette();
        }

        let min_code_size = self.cursor.read_u8()?;
        // Malformed rectangles may exceed the screen; the scratch buffer
        // grows to fit so the frame can still be delivered unclipped.
        let pixel_len = checked_area(width, height)?;
        self.ensure_pixels(pixel_len, pool)?;
        self.ws.pixels[..pixel_len].fill(0);

        let mut dict = Dict::new(&mut self.ws.prefix, &mut self.ws.suffix, &mut self.ws.stack);
        let mut blocks = SubBlockReader::new(&mut self.cursor);
        let outcome = lzw::decompress(
            min_code_size,
            &mut blocks,
            &mut self.ws.pixels[..pixel_len],
            &mut dict,
        )?;

        if outcome.filled < pixel_len {
            self.truncated = true;
        }

        let index = self.frames_seen;
        self.frames_seen += 1;
        tracing::debug!(
            frame = index,
            x = x_offset,
            y = y_offset,
            width,
            height,
            interlaced,
            filled = outcome.filled,
            "decoded frame"
        );

        if index >= skip {
            let info = FrameInfo {
                screen_width: self.screen_width,
                screen_height: self.screen_height,
                background_color_index: self.background_color_index,
                palette: Palette::new(&self.ws.palette, self.palette_len),
                // The control block predates the frame's color table, so
                // the index is only now checkable against it.
                transparent_index: self
                    .transparent_index
                    .filter(|&t| usize::from(t) < self.palette_len),
                interlaced,
                disposal: self.disposal,
                x_offset,
                y_offset,
                width,
                height,
                delay: self.delay,
                index,
                frame_count: self.frame_count,
                pixels: &self.ws.pixels[..pixel_len],
            };
            sink.on_frame(&info);
            self.frames_delivered += 1;
        }

        // Graphic-control state applies to exactly one frame.
        self.transparent_index = None;
        self.delay = 0;
        self.disposal = DisposalMethod::None;

        match outcome.chain {
            ChainEnd::Terminated => Ok(Step::Continue),
            ChainEnd::Truncated => {
                self.truncated = true;
                Ok(Step::Done)
            }
        }
    }

    fn load_palette(&mut self, table: &[u8], entries: usize) {
        for (i, rgb) in table.chunks_exact(3).take(entries).enumerate() {
            let at = i * 4;
            self.ws.palette[at..at + 3].copy_from_slice(rgb);
        }
        self.palette_len = entries;
    }

    fn load_global_palette(&mut self) {
        match self.global_table {
            Some((table, entries)) => self.load_palette(table, entries),
            None => {
                // No color table anywhere; present the smallest legal
                // palette rather than indices into nothing.
                self.ws.palette[..8].fill(0);
                self.palette_len = 2;
            }
        }
    }

    fn ensure_pixels<P: BufferPool>(&mut self, len: usize, pool: &mut P) -> Result<()> {
        if self.ws.pixels.len() < len {
            let old = std::mem::take(&mut self.ws.pixels);
            pool.release(old);
            self.ws.pixels = match pool.acquire(len) {
                Some(buf) if buf.len() >= len => buf,
                _ => return Err(GifError::AllocFailed { len }),
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_undersized_input() {
        let mut sink = crate::SinkFn(|_: &FrameInfo<'_>| {});
        assert_eq!(
            decode(b"GIF89a", &mut sink, 0),
            Err(GifError::Truncated { offset: 6 })
        );
    }

    #[test]
    fn test_rejects_bad_signature() {
        let mut sink = crate::SinkFn(|_: &FrameInfo<'_>| {});
        assert_eq!(
            decode(b"NOTAGIF000000", &mut sink, 0),
            Err(GifError::BadSignature)
        );
    }

    #[test]
    fn test_scan_stops_at_trailer() {
        // An empty block loop: just the trailer, then trailing garbage that
        // must not be read.
        let (frames, truncated) = scan_frames(SliceReader::new(&[0x3B, 0xDE, 0xAD]));
        assert_eq!(frames, 0);
        assert!(!truncated);
    }

    #[test]
    fn test_scan_reports_exhaustion() {
        let (frames, truncated) = scan_frames(SliceReader::new(&[]));
        assert_eq!(frames, 0);
        assert!(truncated);
    }
}
