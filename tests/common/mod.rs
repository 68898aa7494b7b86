//! Helpers that assemble GIF byte streams for the decoder tests.
//!
//! Includes a reference LZW encoder so tests can express frames as index
//! grids; the crate under test only ever decodes.

#![allow(dead_code)] // each test binary uses its own subset

use std::collections::HashMap;

/// Compress palette indices with GIF's variable-width LZW, starting with a
/// CLEAR code and ending with END. Raw code stream, not yet sub-blocked.
pub fn lzw_encode(data: &[u8], min_code_size: u8) -> Vec<u8> {
    assert!((1..=8).contains(&min_code_size));
    let clear: u16 = 1 << min_code_size;
    let end: u16 = clear + 1;

    let mut out = Vec::new();
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut width: u32 = u32::from(min_code_size) + 1;

    fn push(out: &mut Vec<u8>, acc: &mut u32, bits: &mut u32, code: u16, width: u32) {
        *acc |= u32::from(code) << *bits;
        *bits += width;
        while *bits >= 8 {
            out.push((*acc & 0xFF) as u8);
            *acc >>= 8;
            *bits -= 8;
        }
    }

    let mut table: HashMap<Vec<u8>, u16> = HashMap::new();
    for i in 0..clear {
        table.insert(vec![i as u8], i);
    }
    let mut next_code = clear + 2;

    push(&mut out, &mut acc, &mut bits, clear, width);

    let mut current: Vec<u8> = Vec::new();
    for &byte in data {
        assert!(u16::from(byte) < clear, "index exceeds palette");
        let mut next = current.clone();
        next.push(byte);
        if table.contains_key(&next) {
            current = next;
        } else {
            push(&mut out, &mut acc, &mut bits, table[&current], width);
            if next_code < 4096 {
                table.insert(next, next_code);
                next_code += 1;
                // The decoder widens after it assigns the matching entry,
                // one code behind us.
                if u32::from(next_code) == (1 << width) + 1 && width < 12 {
                    width += 1;
                }
            }
            current = vec![byte];
        }
    }
    if !current.is_empty() {
        push(&mut out, &mut acc, &mut bits, table[&current], width);
    }
    push(&mut out, &mut acc, &mut bits, end, width);
    if bits > 0 {
        out.push((acc & 0xFF) as u8);
    }
    out
}

/// Wrap raw bytes into a length-prefixed sub-block chain with terminator.
pub fn sub_blocks(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
    out
}

/// Color-table size field: log2(entries) - 1, entries already a power of two.
fn table_size_flag(entries: usize) -> u8 {
    assert!(entries.is_power_of_two() && (2..=256).contains(&entries));
    (entries.trailing_zeros() - 1) as u8
}

fn write_colors(out: &mut Vec<u8>, colors: &[[u8; 3]]) {
    for color in colors {
        out.extend_from_slice(color);
    }
}

/// Header plus logical screen descriptor, with an optional global color
/// table. `colors` length must be a power of two between 2 and 256.
pub fn screen(width: u16, height: u16, background: u8, gct: Option<&[[u8; 3]]>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"GIF89a");
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    match gct {
        Some(colors) => out.push(0x80 | table_size_flag(colors.len())),
        None => out.push(0),
    }
    out.push(background);
    out.push(0); // aspect ratio
    if let Some(colors) = gct {
        write_colors(&mut out, colors);
    }
    out
}

/// Graphic control extension block.
pub fn graphic_control(disposal: u8, delay: u16, transparent: Option<u8>) -> Vec<u8> {
    let mut flags = (disposal & 0x07) << 2;
    if transparent.is_some() {
        flags |= 0x01;
    }
    let mut out = vec![0x21, 0xF9, 4, flags];
    out.extend_from_slice(&delay.to_le_bytes());
    out.push(transparent.unwrap_or(0));
    out.push(0);
    out
}

/// Image descriptor, optional local color table, and LZW-compressed pixels.
pub fn image(
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    lct: Option<&[[u8; 3]]>,
    interlaced: bool,
    min_code_size: u8,
    pixels: &[u8],
) -> Vec<u8> {
    assert_eq!(pixels.len(), width as usize * height as usize);
    let mut out = vec![0x2C];
    out.extend_from_slice(&x.to_le_bytes());
    out.extend_from_slice(&y.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    let mut flags = 0u8;
    if let Some(colors) = lct {
        flags |= 0x80 | table_size_flag(colors.len());
    }
    if interlaced {
        flags |= 0x40;
    }
    out.push(flags);
    if let Some(colors) = lct {
        write_colors(&mut out, colors);
    }
    out.push(min_code_size);
    out.extend_from_slice(&sub_blocks(&lzw_encode(pixels, min_code_size)));
    out
}

/// Comment extension with the given text.
pub fn comment(text: &[u8]) -> Vec<u8> {
    let mut out = vec![0x21, 0xFE];
    out.extend_from_slice(&sub_blocks(text));
    out
}

/// Plain text extension: 12-byte header block plus a text chain.
pub fn plain_text(text: &[u8]) -> Vec<u8> {
    let mut out = vec![0x21, 0x01, 12];
    out.extend_from_slice(&[0; 12]);
    out.extend_from_slice(&sub_blocks(text));
    out
}

/// NETSCAPE2.0 looping application extension.
pub fn netscape_loop(count: u16) -> Vec<u8> {
    let mut out = vec![0x21, 0xFF, 11];
    out.extend_from_slice(b"NETSCAPE2.0");
    out.push(3);
    out.push(1);
    out.extend_from_slice(&count.to_le_bytes());
    out.push(0);
    out
}

/// The GIF trailer byte.
pub fn trailer() -> Vec<u8> {
    vec![0x3B]
}

/// A grayscale palette with `entries` colors.
pub fn gray_palette(entries: usize) -> Vec<[u8; 3]> {
    (0..entries)
        .map(|i| {
            let v = (i * 255 / entries.max(2).saturating_sub(1).max(1)) as u8;
            [v, v, v]
        })
        .collect()
}

/// A complete single-frame GIF over a global palette.
pub fn single_frame(
    width: u16,
    height: u16,
    palette: &[[u8; 3]],
    min_code_size: u8,
    pixels: &[u8],
) -> Vec<u8> {
    let mut out = screen(width, height, 0, Some(palette));
    out.extend_from_slice(&image(0, 0, width, height, None, false, min_code_size, pixels));
    out.extend_from_slice(&trailer());
    out
}
