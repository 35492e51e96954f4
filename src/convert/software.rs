//! Scalar RGB to NV12 conversion (portable fallback path)
//!
//! BT.601 coefficients, computed in f32 and rounded per sample. Chroma is
//! decimated from the pixel at every even row/column rather than averaged,
//! matching the accelerated kernel.

/// Convert a row-major RGB24 buffer into NV12 layout.
///
/// `out` must be exactly `width * height * 3 / 2` bytes; `width` and `height`
/// must be even. Callers validate dimensions before reaching this point.
pub fn rgb_to_nv12(rgb: &[u8], width: usize, height: usize, out: &mut [u8]) {
    debug_assert_eq!(rgb.len(), width * height * 3);
    debug_assert_eq!(out.len(), width * height * 3 / 2);

    let rgb_stride = width * 3;
    let uv_base = width * height;

    // Y plane at full resolution
    for y in 0..height {
        let src_row = y * rgb_stride;
        let dst_row = y * width;
        for x in 0..width {
            let p = src_row + x * 3;
            let (r, g, b) = (rgb[p] as f32, rgb[p + 1] as f32, rgb[p + 2] as f32);
            out[dst_row + x] = clamp8(0.299 * r + 0.587 * g + 0.114 * b);
        }
    }

    // Interleaved UV plane at half resolution, decimated from even rows/cols
    for cy in 0..height / 2 {
        let src_row = (cy * 2) * rgb_stride;
        let dst_row = uv_base + cy * width;
        for cx in 0..width / 2 {
            let p = src_row + (cx * 2) * 3;
            let (r, g, b) = (rgb[p] as f32, rgb[p + 1] as f32, rgb[p + 2] as f32);
            out[dst_row + cx * 2] = clamp8(-0.169 * r - 0.331 * g + 0.500 * b + 128.0);
            out[dst_row + cx * 2 + 1] = clamp8(0.500 * r - 0.419 * g - 0.081 * b + 128.0);
        }
    }
}

#[inline]
fn clamp8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
