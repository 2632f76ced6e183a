// ============================================================================
// IMAGE FILTERS — 3×3 convolution presets with intensity blending
// ============================================================================

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::{PixelBuffer, to_channel};
use crate::error::{EditorError, EditorResult};
use crate::ops::transform;

/// Kernel that leaves every pixel unchanged.
pub const IDENTITY_KERNEL: [f32; 9] = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];

/// Name of the catalog entry that means "no filter".
pub const ORIGINAL_FILTER: &str = "Original";

/// A named 3×3 convolution preset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterDef {
    pub name: String,
    /// Row-major 3×3 kernel. Anything but 9 entries makes the filter a no-op.
    pub matrix: Vec<f32>,
    /// Blend factor between the input (0.0) and the full convolution (1.0).
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

fn default_intensity() -> f32 {
    1.0
}

impl FilterDef {
    pub fn new(name: impl Into<String>, matrix: [f32; 9], intensity: f32) -> Self {
        Self {
            name: name.into(),
            matrix: matrix.to_vec(),
            intensity,
        }
    }

    /// The kernel, if it has exactly nine entries.
    pub fn kernel(&self) -> Option<[f32; 9]> {
        self.matrix.as_slice().try_into().ok()
    }

    /// Identity kernels are skipped by the pipeline.
    pub fn is_neutral(&self) -> bool {
        self.kernel() == Some(IDENTITY_KERNEL)
    }

    /// Structural check used when a filter enters a catalog.
    pub fn validate(&self) -> EditorResult<()> {
        if self.name.trim().is_empty() {
            return Err(EditorError::unsupported_filter("filter name is empty"));
        }
        if self.matrix.len() != 9 {
            return Err(EditorError::unsupported_filter(format!(
                "'{}' has a {}-entry kernel, expected 9",
                self.name,
                self.matrix.len()
            )));
        }
        if self.matrix.iter().any(|v| !v.is_finite()) || !self.intensity.is_finite() {
            return Err(EditorError::unsupported_filter(format!(
                "'{}' contains non-finite values",
                self.name
            )));
        }
        Ok(())
    }
}

/// The presets shipped with the editor, in display order.
pub fn builtin_filters() -> Vec<FilterDef> {
    const NINTH: f32 = 1.0 / 9.0;
    vec![
        FilterDef::new(ORIGINAL_FILTER, IDENTITY_KERNEL, 1.0),
        FilterDef::new("Vintage", [0.3; 9], 0.8),
        FilterDef::new(
            "Sepia",
            [0.393, 0.769, 0.189, 0.349, 0.686, 0.168, 0.272, 0.534, 0.131],
            1.0,
        ),
        FilterDef::new(
            "Noir",
            [0.299, 0.587, 0.114, 0.299, 0.587, 0.114, 0.299, 0.587, 0.114],
            1.0,
        ),
        FilterDef::new("Vivid", [1.2, 0.0, 0.0, 0.0, 1.2, 0.0, 0.0, 0.0, 1.2], 0.7),
        FilterDef::new("Cool", [0.8, 0.0, 0.2, 0.0, 1.0, 0.0, 0.2, 0.0, 0.8], 0.6),
        FilterDef::new("Warm", [1.1, 0.1, 0.0, 0.1, 1.0, 0.0, 0.0, 0.0, 0.9], 0.6),
        FilterDef::new(
            "Sharpen",
            [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0],
            0.3,
        ),
        FilterDef::new("Blur", [NINTH; 9], 1.0),
        FilterDef::new(
            "Edge",
            [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0],
            0.5,
        ),
    ]
}

// ============================================================================
// CATALOG
// ============================================================================

/// Read-only set of filters a session may select by name.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterCatalog {
    filters: Vec<FilterDef>,
}

impl FilterCatalog {
    /// Build a catalog, rejecting malformed kernels and duplicate names.
    pub fn new(filters: Vec<FilterDef>) -> EditorResult<Self> {
        for (i, f) in filters.iter().enumerate() {
            f.validate()?;
            if filters[..i].iter().any(|other| other.name == f.name) {
                return Err(EditorError::unsupported_filter(format!(
                    "duplicate filter name '{}'",
                    f.name
                )));
            }
        }
        Ok(Self { filters })
    }

    pub fn builtin() -> Self {
        Self {
            filters: builtin_filters(),
        }
    }

    pub fn get(&self, name: &str) -> EditorResult<&FilterDef> {
        self.filters
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| EditorError::unsupported_filter(format!("no filter named '{}'", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterDef> {
        self.filters.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// CONVOLUTION
// ============================================================================

/// Convolve `src` with the filter's kernel and blend by its intensity.
///
/// The 1-pixel border is copied unchanged (no edge extension). Every output
/// pixel is computed from `src` alone, so rows run in parallel without
/// observing each other's writes. Alpha is copied unchanged.
pub fn apply_filter(src: &PixelBuffer, filter: &FilterDef) -> PixelBuffer {
    let Some(kernel) = filter.kernel() else {
        return src.clone();
    };
    if kernel == IDENTITY_KERNEL {
        return src.clone();
    }

    let mut out = src.clone();
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w < 3 || h < 3 {
        return out;
    }

    let intensity = if filter.intensity.is_finite() {
        filter.intensity.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let stride = src.stride();
    let src_raw = src.as_raw();

    out.as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(1)
        .take(h - 2)
        .for_each(|(y, row_out)| {
            for x in 1..w - 1 {
                let mut acc = [0.0f32; 3];
                for ky in 0..3 {
                    let row = (y + ky - 1) * stride;
                    for kx in 0..3 {
                        let weight = kernel[ky * 3 + kx];
                        let pi = row + (x + kx - 1) * 4;
                        acc[0] += src_raw[pi] as f32 * weight;
                        acc[1] += src_raw[pi + 1] as f32 * weight;
                        acc[2] += src_raw[pi + 2] as f32 * weight;
                    }
                }

                let pi = x * 4;
                let src_px = y * stride + pi;
                for c in 0..3 {
                    let original = src_raw[src_px + c] as f32;
                    row_out[pi + c] = to_channel(original + (acc[c] - original) * intensity);
                }
            }
        });

    out
}

/// One thumbnail per catalog entry, each with its filter applied, for the
/// filter picker.
pub fn filter_previews(
    src: &PixelBuffer,
    catalog: &FilterCatalog,
    max_size: u32,
) -> EditorResult<Vec<(String, PixelBuffer)>> {
    let thumb = transform::thumbnail(src, max_size)?;
    Ok(catalog
        .iter()
        .map(|f| (f.name.clone(), apply_filter(&thumb, f)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let v = if (x + y) % 2 == 0 { 220 } else { 30 };
                buf.put_pixel(x, y, [v, v / 2, 255 - v, 200]);
            }
        }
        buf
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let filters = builtin_filters();
        assert_eq!(filters.len(), 10);
        assert!(FilterCatalog::new(filters).is_ok());
        assert!(FilterCatalog::builtin().get(ORIGINAL_FILTER).unwrap().is_neutral());
        assert!(!FilterCatalog::builtin().get("Sepia").unwrap().is_neutral());
    }

    #[test]
    fn unknown_name_is_unsupported() {
        let err = FilterCatalog::builtin().get("Lomo").unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedFilter(_)));
    }

    #[test]
    fn catalog_rejects_bad_kernels_and_duplicates() {
        let bad = FilterDef {
            name: "Short".into(),
            matrix: vec![1.0; 4],
            intensity: 1.0,
        };
        assert!(matches!(
            FilterCatalog::new(vec![bad]),
            Err(EditorError::UnsupportedFilter(_))
        ));

        let dup = vec![
            FilterDef::new("A", IDENTITY_KERNEL, 1.0),
            FilterDef::new("A", [0.3; 9], 1.0),
        ];
        assert!(FilterCatalog::new(dup).is_err());
    }

    #[test]
    fn zero_intensity_is_identity() {
        let buf = checker(7, 5);
        let f = FilterDef::new("Edge", [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0], 0.0);
        assert_eq!(apply_filter(&buf, &f), buf);
    }

    #[test]
    fn malformed_kernel_is_noop() {
        let buf = checker(5, 5);
        let f = FilterDef {
            name: "Broken".into(),
            matrix: vec![0.5; 8],
            intensity: 1.0,
        };
        assert_eq!(apply_filter(&buf, &f), buf);
    }

    #[test]
    fn border_is_left_untouched() {
        let buf = checker(6, 6);
        let blur = FilterCatalog::builtin().get("Blur").unwrap().clone();
        let out = apply_filter(&buf, &blur);
        for x in 0..6 {
            assert_eq!(out.get_pixel(x, 0), buf.get_pixel(x, 0));
            assert_eq!(out.get_pixel(x, 5), buf.get_pixel(x, 5));
        }
        for y in 0..6 {
            assert_eq!(out.get_pixel(0, y), buf.get_pixel(0, y));
            assert_eq!(out.get_pixel(5, y), buf.get_pixel(5, y));
        }
        // Interior actually changed.
        assert_ne!(out.get_pixel(2, 2), buf.get_pixel(2, 2));
    }

    #[test]
    fn convolution_reads_unmodified_neighbours() {
        // A single bright pixel blurred with a box kernel: every neighbour in
        // the 3x3 window must see the original value, not a blurred one.
        let mut buf = PixelBuffer::from_pixel(5, 5, [0, 0, 0, 255]);
        buf.put_pixel(2, 2, [90, 90, 90, 255]);
        let blur = FilterDef::new("Blur", [1.0 / 9.0; 9], 1.0);
        let out = apply_filter(&buf, &blur);
        for y in 1..4 {
            for x in 1..4 {
                assert_eq!(out.get_pixel(x, y), [10, 10, 10, 255]);
            }
        }
    }

    #[test]
    fn uniform_image_under_box_blur_is_stable() {
        let buf = PixelBuffer::from_pixel(8, 8, [123, 45, 67, 89]);
        let blur = FilterCatalog::builtin().get("Blur").unwrap().clone();
        assert_eq!(apply_filter(&buf, &blur), buf);
    }

    #[test]
    fn tiny_buffers_have_no_interior() {
        let buf = checker(2, 9);
        let sharpen = FilterCatalog::builtin().get("Sharpen").unwrap().clone();
        assert_eq!(apply_filter(&buf, &sharpen), buf);
    }

    #[test]
    fn previews_cover_every_filter() {
        let buf = checker(200, 100);
        let catalog = FilterCatalog::builtin();
        let previews = filter_previews(&buf, &catalog, 64).unwrap();
        assert_eq!(previews.len(), catalog.len());
        for (_, thumb) in &previews {
            assert_eq!(thumb.dimensions(), (64, 32));
        }
        assert_eq!(previews[0].0, ORIGINAL_FILTER);
    }
}
