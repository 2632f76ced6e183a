// ============================================================================
// PIXEL BUFFER — the raster substrate every operation reads and writes
// ============================================================================
//
// A `PixelBuffer` is `width * height` RGBA8 pixels, row-major. The length
// invariant `pixels.len() == width * height * 4` is enforced at every
// constructor; code inside the crate relies on it without re-checking.
// ============================================================================

use std::fmt;

use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};

/// Raw RGBA raster plus its dimensions.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// A fully transparent buffer. Zero dimensions are a programming error.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_pixel(width, height, [0, 0, 0, 0])
    }

    /// A buffer filled with a single colour.
    pub fn from_pixel(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        assert!(
            width > 0 && height > 0,
            "PixelBuffer dimensions must be positive (got {}x{})",
            width,
            height
        );
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self { width, height, pixels }
    }

    /// Wrap caller-supplied bytes, checking the length invariant.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> EditorResult<Self> {
        if width == 0 || height == 0 {
            return Err(EditorError::precondition(format!(
                "pixel buffer dimensions must be positive (got {}x{})",
                width, height
            )));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| EditorError::precondition("pixel buffer size overflow"))?;
        if pixels.len() != expected {
            return Err(EditorError::precondition(format!(
                "expected {} bytes for a {}x{} RGBA buffer, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    pub fn from_rgba_image(img: &RgbaImage) -> EditorResult<Self> {
        Self::from_raw(img.width(), img.height(), img.as_raw().clone())
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        // Length invariant guarantees `from_raw` succeeds.
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable access to the bytes. The slice cannot change length, so the
    /// invariant holds.
    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.index(x, y);
        self.pixels[i..i + 4].copy_from_slice(&rgba);
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (y as usize * self.width as usize + x as usize) * 4
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Dumping megabytes of pixels helps nobody.
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

// ============================================================================
// REGIONS & AXES
// ============================================================================

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// True when the rect is non-empty and lies entirely inside a
    /// `width x height` buffer.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= width && b <= height)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{x:{}, y:{}, width:{}, height:{}}}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Mirror axis for flips.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlipAxis {
    /// Mirror columns (left ↔ right).
    Horizontal,
    /// Mirror rows (top ↔ bottom).
    Vertical,
}

// ============================================================================
// HELPER: row-parallel per-pixel transform
// ============================================================================

/// Apply a per-pixel colour transform, producing a new buffer.
/// `transform` receives (r, g, b) as f32 and returns (r, g, b) as f32; the
/// results are rounded and clamped to 0..=255. Alpha is copied unchanged.
pub(crate) fn map_rgb<F>(src: &PixelBuffer, transform: F) -> PixelBuffer
where
    F: Fn(f32, f32, f32) -> (f32, f32, f32) + Sync,
{
    let stride = src.stride();
    let src_raw = src.as_raw();
    let mut dst_raw = vec![0u8; src_raw.len()];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for (px_out, px_in) in row_out.chunks_exact_mut(4).zip(row_in.chunks_exact(4)) {
            let (r, g, b) = transform(px_in[0] as f32, px_in[1] as f32, px_in[2] as f32);
            px_out[0] = to_channel(r);
            px_out[1] = to_channel(g);
            px_out[2] = to_channel(b);
            px_out[3] = px_in[3];
        }
    });

    PixelBuffer {
        width: src.width,
        height: src.height,
        pixels: dst_raw,
    }
}

/// Round and clamp a channel value; NaN maps to 0.
#[inline]
pub(crate) fn to_channel(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_wrong_length() {
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 15]).is_err());
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn from_raw_rejects_zero_dimensions() {
        assert!(PixelBuffer::from_raw(0, 3, Vec::new()).is_err());
    }

    #[test]
    fn put_and_get_pixel() {
        let mut buf = PixelBuffer::new(3, 2);
        buf.put_pixel(2, 1, [1, 2, 3, 4]);
        assert_eq!(buf.get_pixel(2, 1), [1, 2, 3, 4]);
        assert_eq!(buf.get_pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(&buf.as_raw()[20..24], &[1, 2, 3, 4]);
    }

    #[test]
    fn rgba_image_round_trip_keeps_bytes() {
        let mut buf = PixelBuffer::from_pixel(4, 3, [10, 20, 30, 255]);
        buf.put_pixel(1, 1, [200, 100, 50, 128]);
        let back = PixelBuffer::from_rgba_image(&buf.to_rgba_image()).unwrap();
        assert_eq!(back, buf);
    }

    #[test]
    fn rect_bounds() {
        assert!(Rect::new(0, 0, 4, 4).fits_within(4, 4));
        assert!(Rect::new(1, 1, 3, 3).fits_within(4, 4));
        assert!(!Rect::new(5, 5, 3, 3).fits_within(4, 4));
        assert!(!Rect::new(2, 0, 3, 1).fits_within(4, 4));
        assert!(!Rect::new(0, 0, 0, 2).fits_within(4, 4));
        assert!(!Rect::new(u32::MAX, 0, 2, 1).fits_within(4, 4));
    }

    #[test]
    fn map_rgb_keeps_alpha_and_clamps() {
        let buf = PixelBuffer::from_pixel(2, 2, [250, 5, 128, 77]);
        let out = map_rgb(&buf, |r, g, b| (r + 10.0, g - 10.0, b));
        assert_eq!(out.get_pixel(1, 1), [255, 0, 128, 77]);
    }
}
