// ============================================================================
// ADJUSTMENT OPERATIONS — brightness / contrast / saturation / hue
// ============================================================================
//
// Stages run per pixel in a fixed order (brightness, contrast, saturation,
// hue) and each stage clamps to 0..=255 before the next one reads the value.
// Alpha is never touched. Rows are processed in parallel via rayon.
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::canvas::{PixelBuffer, map_rgb};

pub const BRIGHTNESS_RANGE: (i32, i32) = (-100, 100);
pub const CONTRAST_RANGE: (i32, i32) = (-100, 100);
pub const HUE_RANGE: (i32, i32) = (-180, 180);
/// Saturation factor range, i.e. slider -100..=100 mapped through `1 + pct/100`.
pub const SATURATION_RANGE: (f32, f32) = (0.0, 2.0);

/// Colour adjustment parameters. Copied, never shared.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    /// Additive offset per channel, -100..=100.
    pub brightness: i32,
    /// Contrast around mid-grey 128, -100..=100.
    pub contrast: i32,
    /// Saturation factor; 1.0 is neutral.
    pub saturation: f32,
    /// Hue rotation in degrees, -180..=180.
    pub hue: i32,
}

impl Adjustments {
    pub const NEUTRAL: Adjustments = Adjustments {
        brightness: 0,
        contrast: 0,
        saturation: 1.0,
        hue: 0,
    };

    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }

    /// Clamp every field into its legal range. Non-finite saturation resets
    /// to neutral.
    pub fn clamped(self) -> Self {
        let saturation = if self.saturation.is_finite() {
            self.saturation.clamp(SATURATION_RANGE.0, SATURATION_RANGE.1)
        } else {
            1.0
        };
        Self {
            brightness: self.brightness.clamp(BRIGHTNESS_RANGE.0, BRIGHTNESS_RANGE.1),
            contrast: self.contrast.clamp(CONTRAST_RANGE.0, CONTRAST_RANGE.1),
            saturation,
            hue: self.hue.clamp(HUE_RANGE.0, HUE_RANGE.1),
        }
    }
}

impl Default for Adjustments {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Slider value (-100..=100) → saturation factor.
pub fn saturation_from_percent(pct: i32) -> f32 {
    1.0 + pct.clamp(-100, 100) as f32 / 100.0
}

/// Saturation factor → slider value (-100..=100).
pub fn saturation_to_percent(factor: f32) -> i32 {
    ((factor - 1.0) * 100.0).round().clamp(-100.0, 100.0) as i32
}

// ============================================================================
// PARTIAL UPDATES (slider drags touch one field at a time)
// ============================================================================

/// A partial change to [`Adjustments`]; `None` fields keep their value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AdjustmentUpdate {
    pub brightness: Option<i32>,
    pub contrast: Option<i32>,
    pub saturation: Option<f32>,
    pub hue: Option<i32>,
}

impl AdjustmentUpdate {
    pub fn brightness(mut self, v: i32) -> Self {
        self.brightness = Some(v);
        self
    }

    pub fn contrast(mut self, v: i32) -> Self {
        self.contrast = Some(v);
        self
    }

    pub fn saturation(mut self, v: f32) -> Self {
        self.saturation = Some(v);
        self
    }

    /// Saturation given as a slider percentage.
    pub fn saturation_percent(self, pct: i32) -> Self {
        self.saturation(saturation_from_percent(pct))
    }

    pub fn hue(mut self, v: i32) -> Self {
        self.hue = Some(v);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.brightness.is_none()
            && self.contrast.is_none()
            && self.saturation.is_none()
            && self.hue.is_none()
    }

    /// Merge into `base`, clamping the result.
    pub fn apply_to(&self, base: Adjustments) -> Adjustments {
        Adjustments {
            brightness: self.brightness.unwrap_or(base.brightness),
            contrast: self.contrast.unwrap_or(base.contrast),
            saturation: self.saturation.unwrap_or(base.saturation),
            hue: self.hue.unwrap_or(base.hue),
        }
        .clamped()
    }

    /// History label, e.g. "Adjusted brightness".
    pub fn label(&self) -> String {
        let touched: Vec<&str> = [
            ("brightness", self.brightness.is_some()),
            ("contrast", self.contrast.is_some()),
            ("saturation", self.saturation.is_some()),
            ("hue", self.hue.is_some()),
        ]
        .iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| *name)
        .collect();

        match touched.as_slice() {
            [single] => format!("Adjusted {}", single),
            _ => "Adjusted image".to_string(),
        }
    }
}

// ============================================================================
// PIXEL MATH
// ============================================================================

/// Contrast multiplier for a contrast value in -100..=100.
#[inline]
pub fn contrast_factor(contrast: i32) -> f32 {
    let c = contrast as f32;
    (259.0 * (c + 255.0)) / (255.0 * (259.0 - c))
}

/// Apply `adjustments` to `src`, returning a new buffer.
pub fn apply_adjustments(src: &PixelBuffer, adjustments: &Adjustments) -> PixelBuffer {
    let adj = adjustments.clamped();
    let brightness = adj.brightness as f32;
    let factor = contrast_factor(adj.contrast);
    let saturation = adj.saturation;
    let hue = adj.hue;

    map_rgb(src, move |r, g, b| {
        // Brightness
        let r = (r + brightness).clamp(0.0, 255.0);
        let g = (g + brightness).clamp(0.0, 255.0);
        let b = (b + brightness).clamp(0.0, 255.0);

        // Contrast
        let r = (factor * (r - 128.0) + 128.0).clamp(0.0, 255.0);
        let g = (factor * (g - 128.0) + 128.0).clamp(0.0, 255.0);
        let b = (factor * (b - 128.0) + 128.0).clamp(0.0, 255.0);

        // Saturation, pivoting on post-contrast luma
        let gray = 0.299 * r + 0.587 * g + 0.114 * b;
        let r = (gray + saturation * (r - gray)).clamp(0.0, 255.0);
        let g = (gray + saturation * (g - gray)).clamp(0.0, 255.0);
        let b = (gray + saturation * (b - gray)).clamp(0.0, 255.0);

        if hue == 0 {
            return (r, g, b);
        }
        let (h, s, v) = rgb_to_hsv(r, g, b);
        let h = (h + hue as f32).rem_euclid(360.0);
        hsv_to_rgb(h, s, v)
    })
}

/// RGB (0..255) → HSV (H: 0..360 degrees, S: 0..1, V: 0..1)
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let r = r / 255.0;
    let g = g / 255.0;
    let b = b / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max == 0.0 { 0.0 } else { delta / max };
    if delta == 0.0 {
        return (0.0, s, max);
    }

    let h = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    (h * 60.0, s, max)
}

/// HSV (H: 0..360 degrees, S: 0..1, V: 0..1) → RGB (0..255)
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let h = h.rem_euclid(360.0);
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    ((r + m) * 255.0, (g + m) * 255.0, (b + m) * 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let r = (x * 255 / w.max(1)) as u8;
                let g = (y * 255 / h.max(1)) as u8;
                let b = ((x + y) * 13 % 256) as u8;
                buf.put_pixel(x, y, [r, g, b, (x * 40 % 256) as u8]);
            }
        }
        buf
    }

    #[test]
    fn neutral_adjustments_are_identity() {
        let buf = gradient(16, 9);
        assert_eq!(apply_adjustments(&buf, &Adjustments::NEUTRAL), buf);
    }

    #[test]
    fn brightness_adds_per_channel() {
        let buf = PixelBuffer::from_pixel(4, 4, [100, 100, 100, 255]);
        let adj = Adjustments {
            brightness: 50,
            ..Adjustments::NEUTRAL
        };
        let out = apply_adjustments(&buf, &adj);
        assert!(out.as_raw().chunks_exact(4).all(|p| p == [150, 150, 150, 255]));
    }

    #[test]
    fn brightness_clamps_before_contrast() {
        let buf = PixelBuffer::from_pixel(1, 1, [250, 10, 128, 9]);
        let adj = Adjustments {
            brightness: 100,
            ..Adjustments::NEUTRAL
        };
        assert_eq!(apply_adjustments(&buf, &adj).get_pixel(0, 0), [255, 110, 228, 9]);
    }

    #[test]
    fn contrast_factor_matches_closed_form_at_limits() {
        assert!((contrast_factor(100) - 91945.0 / 40545.0).abs() < 1e-5);
        assert!((contrast_factor(-100) - 40145.0 / 91545.0).abs() < 1e-5);
        assert_eq!(contrast_factor(0), 1.0);
    }

    #[test]
    fn extreme_contrast_clamps_channels() {
        let buf = PixelBuffer::from_pixel(1, 1, [200, 60, 128, 33]);
        let high = Adjustments {
            contrast: 100,
            ..Adjustments::NEUTRAL
        };
        assert_eq!(apply_adjustments(&buf, &high).get_pixel(0, 0), [255, 0, 128, 33]);

        let grey = PixelBuffer::from_pixel(1, 1, [200, 200, 200, 33]);
        let low = Adjustments {
            contrast: -100,
            ..Adjustments::NEUTRAL
        };
        assert_eq!(apply_adjustments(&grey, &low).get_pixel(0, 0), [160, 160, 160, 33]);
    }

    #[test]
    fn out_of_range_contrast_is_clamped_not_rejected() {
        let buf = gradient(8, 8);
        let wild = Adjustments {
            contrast: 259,
            ..Adjustments::NEUTRAL
        };
        let capped = Adjustments {
            contrast: 100,
            ..Adjustments::NEUTRAL
        };
        assert_eq!(apply_adjustments(&buf, &wild), apply_adjustments(&buf, &capped));
    }

    #[test]
    fn zero_saturation_produces_grey() {
        let buf = PixelBuffer::from_pixel(2, 2, [200, 50, 100, 255]);
        let adj = Adjustments {
            saturation: 0.0,
            ..Adjustments::NEUTRAL
        };
        let [r, g, b, _] = apply_adjustments(&buf, &adj).get_pixel(0, 0);
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn hue_rotation_by_120_cycles_primaries() {
        let buf = PixelBuffer::from_pixel(1, 1, [255, 0, 0, 255]);
        let adj = Adjustments {
            hue: 120,
            ..Adjustments::NEUTRAL
        };
        assert_eq!(apply_adjustments(&buf, &adj).get_pixel(0, 0), [0, 255, 0, 255]);

        let adj = Adjustments {
            hue: -120,
            ..Adjustments::NEUTRAL
        };
        assert_eq!(apply_adjustments(&buf, &adj).get_pixel(0, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn hsv_round_trip() {
        for &(r, g, b) in &[(255.0, 0.0, 0.0), (12.0, 200.0, 99.0), (0.0, 0.0, 0.0), (77.0, 77.0, 77.0)] {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let (r2, g2, b2) = hsv_to_rgb(h, s, v);
            assert!((r - r2).abs() < 0.5 && (g - g2).abs() < 0.5 && (b - b2).abs() < 0.5);
        }
    }

    #[test]
    fn saturation_percent_conversions() {
        assert_eq!(saturation_from_percent(0), 1.0);
        assert_eq!(saturation_from_percent(-100), 0.0);
        assert_eq!(saturation_from_percent(50), 1.5);
        assert_eq!(saturation_to_percent(1.25), 25);
        assert_eq!(saturation_to_percent(0.0), -100);
    }

    #[test]
    fn partial_update_merges_and_labels() {
        let base = Adjustments {
            brightness: 10,
            ..Adjustments::NEUTRAL
        };
        let update = AdjustmentUpdate::default().contrast(500);
        let merged = update.apply_to(base);
        assert_eq!(merged.brightness, 10);
        assert_eq!(merged.contrast, 100);
        assert_eq!(update.label(), "Adjusted contrast");
        assert_eq!(
            AdjustmentUpdate::default().hue(3).brightness(1).label(),
            "Adjusted image"
        );
    }
}
