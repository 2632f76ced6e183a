use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::DynamicImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::canvas::PixelBuffer;
use crate::error::EditorResult;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Extensions `load_buffer` will try to decode (lowercase).
pub const INPUT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tga", "webp"];

// ============================================================================
// FORMATS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tga,
}

impl SaveFormat {
    pub fn all() -> &'static [SaveFormat] {
        &[SaveFormat::Png, SaveFormat::Jpeg, SaveFormat::Bmp, SaveFormat::Tga]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
        }
    }

    /// Parse a format name or file extension, case-insensitively.
    pub fn parse(s: &str) -> Option<SaveFormat> {
        match s.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            _ => None,
        }
    }

    /// Format implied by `path`'s extension.
    pub fn from_path(path: &Path) -> Option<SaveFormat> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(SaveFormat::parse)
    }
}

pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| INPUT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

// ============================================================================
// DECODE / ENCODE
// ============================================================================

/// Decode any supported image file into an RGBA buffer.
pub fn load_buffer(path: &Path) -> EditorResult<PixelBuffer> {
    let img = image::open(path)?.to_rgba8();
    crate::log_info!("io: decoded {} ({}x{})", path.display(), img.width(), img.height());
    PixelBuffer::from_rgba_image(&img)
}

/// Encode `buffer` and write it to `path`. `quality` only affects JPEG.
pub fn encode_and_write(
    buffer: &PixelBuffer,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> EditorResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let (width, height) = buffer.dimensions();

    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(buffer.as_raw(), width, height, image::ColorType::Rgba8)?;
        }
        SaveFormat::Jpeg => {
            // JPEG has no alpha
            let rgb = DynamicImage::ImageRgba8(buffer.to_rgba_image()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(rgb.as_raw(), width, height, image::ColorType::Rgb8)?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(buffer.as_raw(), width, height, image::ColorType::Rgba8)?;
        }
        SaveFormat::Tga => {
            let encoder = TgaEncoder::new(&mut writer);
            encoder.encode(buffer.as_raw(), width, height, image::ColorType::Rgba8)?;
        }
    }

    writer.flush()?;
    crate::log_info!("io: wrote {} as {:?}", path.display(), format);
    Ok(())
}
