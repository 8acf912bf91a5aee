//! Texture encoder
//!
//! Decodes embedded image payloads and re-encodes pixel data for the formats
//! the materializer writes.

use std::borrow::Cow;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageReader};

use crate::format::Encoding;
use crate::{TextureError, TextureResult};

/// Texture encoding options
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { jpeg_quality: 90 }
    }
}

/// Texture encoder
#[derive(Debug, Clone, Default)]
pub struct TextureEncoder {
    options: EncodeOptions,
}

impl TextureEncoder {
    /// Create new encoder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create encoder with custom options
    pub fn with_options(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// Decode an encoded image payload
    ///
    /// The format is guessed from the content; `declared` is used for
    /// payloads without a magic number (TGA).
    pub fn decode(bytes: &[u8], declared: Option<Encoding>) -> TextureResult<DynamicImage> {
        Ok(reader_for(bytes, declared)?.decode()?)
    }

    /// Read only the dimensions of an encoded payload
    ///
    /// Returns `None` when the content is neither a format the decoder
    /// recognises nor readable as the `declared` one.
    pub fn probe_dimensions(bytes: &[u8], declared: Option<Encoding>) -> Option<(u32, u32)> {
        reader_for(bytes, declared).ok()?.into_dimensions().ok()
    }

    /// Encode pixel data into an in-memory file
    pub fn encode(&self, img: &DynamicImage, encoding: Encoding) -> TextureResult<Vec<u8>> {
        if img.width() == 0 || img.height() == 0 {
            return Err(TextureError::InvalidDimensions {
                width: img.width(),
                height: img.height(),
            });
        }

        let img = normalize_layout(img, encoding);
        let mut buffer = Cursor::new(Vec::new());

        match encoding {
            Encoding::Jpeg => {
                let quality = self.options.jpeg_quality.clamp(1, 100);
                img.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
            }
            _ => img.write_to(&mut buffer, encoding.to_img_format())?,
        }

        Ok(buffer.into_inner())
    }

    /// Encode pixel data and write it to `output_path`
    pub fn write(&self, img: &DynamicImage, output_path: impl AsRef<Path>, encoding: Encoding) -> TextureResult<()> {
        let bytes = self.encode(img, encoding)?;
        fs::write(output_path.as_ref(), bytes)?;
        Ok(())
    }
}

fn reader_for(bytes: &[u8], declared: Option<Encoding>) -> TextureResult<ImageReader<Cursor<&[u8]>>> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if reader.format().is_none() {
        if let Some(encoding) = declared {
            reader.set_format(encoding.to_img_format());
        }
    }
    Ok(reader)
}

/// Convert pixel layouts the target encoder cannot take
fn normalize_layout(img: &DynamicImage, encoding: Encoding) -> Cow<'_, DynamicImage> {
    let color = img.color();
    match encoding {
        // No alpha channel in JPEG
        Encoding::Jpeg => match color {
            ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(img),
            _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
        },
        Encoding::Bmp | Encoding::Targa | Encoding::WebP => match color {
            ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => Cow::Borrowed(img),
            _ if color.has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
            _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
        },
        Encoding::Png | Encoding::Tiff => match color {
            ColorType::Rgb32F | ColorType::Rgba32F => Cow::Owned(DynamicImage::ImageRgba16(img.to_rgba16())),
            ColorType::La8 if encoding == Encoding::Tiff => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
            ColorType::La16 if encoding == Encoding::Tiff => Cow::Owned(DynamicImage::ImageRgba16(img.to_rgba16())),
            _ => Cow::Borrowed(img),
        },
    }
}
