//! GIF four-pass interlace row ordering.
//!
//! Interlaced frames store their rows in four passes (every 8th row from 0,
//! every 8th from 4, every 4th from 2, every 2nd from 1). The decoder
//! delivers interlaced pixel data exactly as stored and sets
//! [`FrameInfo::interlaced`](crate::FrameInfo::interlaced); callers that
//! want top-to-bottom display order apply [`deinterlace`] themselves.

/// (first row, row step) for each of the four passes.
const PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

/// Display row indices in the order an interlaced stream stores them.
pub fn interlaced_rows(height: usize) -> impl Iterator<Item = usize> {
    PASSES
        .iter()
        .flat_map(move |&(first, step)| (first..height).step_by(step))
}

/// Reorder an interlaced frame's rows into top-to-bottom display order.
///
/// Rows missing from a short `pixels` slice (a partially delivered frame)
/// are left zeroed in the output.
pub fn deinterlace(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut output = vec![0u8; width * height];
    for (src_row, dst_row) in interlaced_rows(height).enumerate() {
        let src = src_row * width;
        let dst = dst_row * width;
        if src + width <= pixels.len() {
            output[dst..dst + width].copy_from_slice(&pixels[src..src + width]);
        }
    }
    output
}
