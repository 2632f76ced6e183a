// ============================================================================
// TRANSFORM OPERATIONS — rotate, flip, crop, thumbnail
// ============================================================================
//
// Rotations are restricted to quarter turns, so every transform here is an
// exact pixel remap with no interpolation. Only `thumbnail` resamples.
// ============================================================================

use image::imageops;
use serde::{Deserialize, Serialize};

use crate::canvas::{FlipAxis, PixelBuffer, Rect};
use crate::error::{EditorError, EditorResult};

/// A clockwise quarter-turn rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Any multiple of 90 (negative = counter-clockwise).
    pub fn from_degrees(degrees: i32) -> EditorResult<Self> {
        if degrees % 90 != 0 {
            return Err(EditorError::precondition(format!(
                "rotation must be a multiple of 90 degrees (got {})",
                degrees
            )));
        }
        Ok(match degrees.rem_euclid(360) {
            0 => Rotation::None,
            90 => Rotation::Cw90,
            180 => Rotation::Cw180,
            _ => Rotation::Cw270,
        })
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Whether width and height trade places.
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

/// Rotate about the buffer centre.
pub fn rotate(src: &PixelBuffer, rotation: Rotation) -> PixelBuffer {
    match rotation {
        Rotation::None => src.clone(),
        Rotation::Cw90 => rotate_90cw(src),
        Rotation::Cw180 => rotate_180(src),
        Rotation::Cw270 => rotate_90ccw(src),
    }
}

/// Rotate 90° clockwise (swaps W↔H).
fn rotate_90cw(src: &PixelBuffer) -> PixelBuffer {
    let (w, h) = src.dimensions();
    let mut dst = PixelBuffer::new(h, w);
    for y in 0..h {
        for x in 0..w {
            dst.put_pixel(h - 1 - y, x, src.get_pixel(x, y));
        }
    }
    dst
}

/// Rotate 90° counter-clockwise (swaps W↔H).
fn rotate_90ccw(src: &PixelBuffer) -> PixelBuffer {
    let (w, h) = src.dimensions();
    let mut dst = PixelBuffer::new(h, w);
    for y in 0..h {
        for x in 0..w {
            dst.put_pixel(y, w - 1 - x, src.get_pixel(x, y));
        }
    }
    dst
}

fn rotate_180(src: &PixelBuffer) -> PixelBuffer {
    let mut dst = src.clone();
    let raw = dst.as_raw_mut();
    // Reversing pixel order (not bytes) is a half turn.
    let n = raw.len() / 4;
    for i in 0..n / 2 {
        let j = n - 1 - i;
        for c in 0..4 {
            raw.swap(i * 4 + c, j * 4 + c);
        }
    }
    dst
}

/// Mirror along `axis`. Dimensions are unchanged.
pub fn flip(src: &PixelBuffer, axis: FlipAxis) -> PixelBuffer {
    let mut dst = src.clone();
    let stride = src.stride();
    let raw = dst.as_raw_mut();
    match axis {
        FlipAxis::Horizontal => {
            for row in raw.chunks_exact_mut(stride) {
                let w = row.len() / 4;
                for x in 0..w / 2 {
                    let mirror = w - 1 - x;
                    for c in 0..4 {
                        row.swap(x * 4 + c, mirror * 4 + c);
                    }
                }
            }
        }
        FlipAxis::Vertical => {
            let h = raw.len() / stride;
            for y in 0..h / 2 {
                let (top, bottom) = raw.split_at_mut((h - 1 - y) * stride);
                top[y * stride..(y + 1) * stride].swap_with_slice(&mut bottom[..stride]);
            }
        }
    }
    dst
}

/// Copy out `rect`. Fails with `InvalidRegion` unless the rect is non-empty
/// and fully inside `src`.
pub fn crop(src: &PixelBuffer, rect: Rect) -> EditorResult<PixelBuffer> {
    let (w, h) = src.dimensions();
    if !rect.fits_within(w, h) {
        return Err(EditorError::invalid_region(rect, w, h));
    }

    let src_stride = src.stride();
    let row_bytes = rect.width as usize * 4;
    let mut out = Vec::with_capacity(row_bytes * rect.height as usize);
    let raw = src.as_raw();
    for y in rect.y..rect.y + rect.height {
        let start = y as usize * src_stride + rect.x as usize * 4;
        out.extend_from_slice(&raw[start..start + row_bytes]);
    }
    PixelBuffer::from_raw(rect.width, rect.height, out)
}

/// Uniform downscale so the longer side is at most `max_size`. Buffers that
/// already fit are returned as-is (never upscaled).
pub fn thumbnail(src: &PixelBuffer, max_size: u32) -> EditorResult<PixelBuffer> {
    if max_size == 0 {
        return Err(EditorError::precondition("thumbnail size must be positive"));
    }
    let (w, h) = src.dimensions();
    if w.max(h) <= max_size {
        return Ok(src.clone());
    }

    let scale = (max_size as f64 / w as f64).min(max_size as f64 / h as f64);
    let tw = ((w as f64 * scale).round() as u32).clamp(1, max_size);
    let th = ((h as f64 * scale).round() as u32).clamp(1, max_size);

    let resized = imageops::resize(&src.to_rgba_image(), tw, th, imageops::FilterType::Triangle);
    PixelBuffer::from_rgba_image(&resized)
}

// ============================================================================
// ASPECT-RATIO CROP PRESETS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    Free,
    Square,
    Ratio4x3,
    Ratio16x9,
    Ratio3x2,
    Ratio9x16,
}

impl AspectRatio {
    pub fn all() -> &'static [AspectRatio] {
        &[
            AspectRatio::Free,
            AspectRatio::Square,
            AspectRatio::Ratio4x3,
            AspectRatio::Ratio16x9,
            AspectRatio::Ratio3x2,
            AspectRatio::Ratio9x16,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Free => "Free",
            AspectRatio::Square => "1:1",
            AspectRatio::Ratio4x3 => "4:3",
            AspectRatio::Ratio16x9 => "16:9",
            AspectRatio::Ratio3x2 => "3:2",
            AspectRatio::Ratio9x16 => "9:16",
        }
    }

    /// Width / height, or `None` for free-form.
    pub fn ratio(&self) -> Option<(u32, u32)> {
        match self {
            AspectRatio::Free => None,
            AspectRatio::Square => Some((1, 1)),
            AspectRatio::Ratio4x3 => Some((4, 3)),
            AspectRatio::Ratio16x9 => Some((16, 9)),
            AspectRatio::Ratio3x2 => Some((3, 2)),
            AspectRatio::Ratio9x16 => Some((9, 16)),
        }
    }

    /// Largest centred rect of this ratio inside a `width x height` buffer.
    pub fn centered_rect(&self, width: u32, height: u32) -> Rect {
        let Some((rw, rh)) = self.ratio() else {
            return Rect::new(0, 0, width, height);
        };
        // Integer math: try full width first, fall back to full height.
        let (w64, h64) = (width as u64, height as u64);
        let (cw, ch) = if w64 * rh as u64 <= h64 * rw as u64 {
            (w64, w64 * rh as u64 / rw as u64)
        } else {
            (h64 * rw as u64 / rh as u64, h64)
        };
        let cw = cw.max(1) as u32;
        let ch = ch.max(1) as u32;
        Rect::new((width - cw) / 2, (height - ch) / 2, cw, ch)
    }
}
