//! Bit-plane decoding
//!
//! A plane is `height` rows of `ceil(width / 8)` bytes. Within a byte bit 0
//! is the leftmost texel. Set bits decode to 255 (lit), clear bits to 0.

use crate::render::occlusion::OcclusionError;

/// Bytes per source row for a plane `width` texels wide
pub const fn bytes_per_row(width: u32) -> usize {
    (width as usize + 7) / 8
}

/// Bytes per source plane
pub const fn bytes_per_plane(width: u32, height: u32) -> usize {
    bytes_per_row(width) * height as usize
}

/// Decode one plane from `src` and append `width * height` texels to `out`
pub fn decode_plane(src: &[u8], width: u32, height: u32, out: &mut Vec<u8>) -> Result<(), OcclusionError> {
    if width == 0 || height == 0 {
        return Ok(());
    }
    let row_len = bytes_per_row(width);
    let needed = row_len * height as usize;
    if src.len() < needed {
        return Err(OcclusionError::TruncatedBits {
            needed,
            available: src.len(),
        });
    }

    out.reserve(width as usize * height as usize);
    for row in src[..needed].chunks_exact(row_len) {
        let mut remaining = width as usize;
        'row: for &byte in row {
            for bit in 0..8 {
                if remaining == 0 {
                    break 'row;
                }
                out.push(if (byte >> bit) & 1 != 0 { 255 } else { 0 });
                remaining -= 1;
            }
        }
    }
    Ok(())
}

/// 3x3 box filter with edge clamping
///
/// Each texel becomes the truncated mean of itself and its in-bounds
/// neighbours: 4 samples in a corner, 6 on an edge, 9 inside.
pub fn box_filter(plane: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        let rows = y.saturating_sub(1)..=(y + 1).min(h - 1);
        for x in 0..w {
            let cols = x.saturating_sub(1)..=(x + 1).min(w - 1);
            let mut sum = 0u32;
            let mut count = 0u32;
            for sy in rows.clone() {
                for sx in cols.clone() {
                    sum += u32::from(plane[sy * w + sx]);
                    count += 1;
                }
            }
            out.push((sum / count) as u8);
        }
    }
    out
}
