//! Texture format inference
//!
//! Two independent tables: one maps whatever format metadata an image carries
//! to a canonical extension, the other maps an extension to the encoder that
//! writes it. Adding an extension to one never changes the other.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::ImageFormat as ImgFormat;
use serde::{Deserialize, Serialize};

use crate::TextureError;

/// Canonical texture file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureExtension {
    Jpg,
    Png,
    Bmp,
    Tga,
    Tif,
    Webp,
}

impl TextureExtension {
    pub const ALL: [TextureExtension; 6] = [
        TextureExtension::Jpg,
        TextureExtension::Png,
        TextureExtension::Bmp,
        TextureExtension::Tga,
        TextureExtension::Tif,
        TextureExtension::Webp,
    ];

    /// Extension without the leading dot
    pub fn as_str(&self) -> &'static str {
        match self {
            TextureExtension::Jpg => "jpg",
            TextureExtension::Png => "png",
            TextureExtension::Bmp => "bmp",
            TextureExtension::Tga => "tga",
            TextureExtension::Tif => "tif",
            TextureExtension::Webp => "webp",
        }
    }

    /// Map a declared image format (any case)
    pub fn from_declared_format(format: &str) -> Option<Self> {
        match format.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(TextureExtension::Jpg),
            "png" => Some(TextureExtension::Png),
            "bmp" => Some(TextureExtension::Bmp),
            "tga" => Some(TextureExtension::Tga),
            "tif" | "tiff" => Some(TextureExtension::Tif),
            "webp" => Some(TextureExtension::Webp),
            _ => None,
        }
    }

    /// Map a file extension (any case, no leading dot)
    pub fn from_path_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(TextureExtension::Jpg),
            "tiff" | "tif" => Some(TextureExtension::Tif),
            "png" => Some(TextureExtension::Png),
            "bmp" => Some(TextureExtension::Bmp),
            "tga" => Some(TextureExtension::Tga),
            "webp" => Some(TextureExtension::Webp),
            _ => None,
        }
    }

    /// Encoder used when writing a file with this extension
    pub fn encoding(&self) -> Encoding {
        extension_to_encoding(self.as_str())
    }
}

impl fmt::Display for TextureExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infer the extension an image should be written with
///
/// The declared format wins; otherwise the extension of the current path is
/// used; anything unrecognised ends up as png.
pub fn infer_extension(declared_format: Option<&str>, current_path: Option<&str>) -> TextureExtension {
    if let Some(ext) = declared_format.and_then(TextureExtension::from_declared_format) {
        return ext;
    }

    current_path
        .and_then(|path| Path::new(path).extension())
        .and_then(|ext| ext.to_str())
        .and_then(TextureExtension::from_path_extension)
        .unwrap_or(TextureExtension::Png)
}

/// Concrete image encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    Jpeg,
    Png,
    Bmp,
    Targa,
    Tiff,
    WebP,
}

impl Encoding {
    /// Identifier stored in an image's `file_format`
    pub fn identifier(&self) -> &'static str {
        match self {
            Encoding::Jpeg => "JPEG",
            Encoding::Png => "PNG",
            Encoding::Bmp => "BMP",
            Encoding::Targa => "TARGA",
            Encoding::Tiff => "TIFF",
            Encoding::WebP => "WEBP",
        }
    }

    /// Parse an encoder identifier (any case)
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier.to_ascii_uppercase().as_str() {
            "JPEG" | "JPG" => Some(Encoding::Jpeg),
            "PNG" => Some(Encoding::Png),
            "BMP" => Some(Encoding::Bmp),
            "TARGA" | "TGA" => Some(Encoding::Targa),
            "TIFF" | "TIF" => Some(Encoding::Tiff),
            "WEBP" => Some(Encoding::WebP),
            _ => None,
        }
    }

    /// Parse an image media type such as `image/png`
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Encoding::Jpeg),
            "image/png" => Some(Encoding::Png),
            "image/bmp" => Some(Encoding::Bmp),
            "image/x-tga" | "image/x-targa" | "image/tga" => Some(Encoding::Targa),
            "image/tiff" => Some(Encoding::Tiff),
            "image/webp" => Some(Encoding::WebP),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Encoding::Jpeg => "image/jpeg",
            Encoding::Png => "image/png",
            Encoding::Bmp => "image/bmp",
            Encoding::Targa => "image/x-tga",
            Encoding::Tiff => "image/tiff",
            Encoding::WebP => "image/webp",
        }
    }

    /// Convert to image crate's format
    pub fn to_img_format(&self) -> ImgFormat {
        match self {
            Encoding::Jpeg => ImgFormat::Jpeg,
            Encoding::Png => ImgFormat::Png,
            Encoding::Bmp => ImgFormat::Bmp,
            Encoding::Targa => ImgFormat::Tga,
            Encoding::Tiff => ImgFormat::Tiff,
            Encoding::WebP => ImgFormat::WebP,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for Encoding {
    type Err = TextureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Encoding::from_identifier(s).ok_or_else(|| TextureError::UnsupportedFormat(s.to_string()))
    }
}

/// Encoder for an extension; anything unmapped is written as PNG
pub fn extension_to_encoding(ext: &str) -> Encoding {
    match ext {
        "jpg" => Encoding::Jpeg,
        "png" => Encoding::Png,
        "bmp" => Encoding::Bmp,
        "tga" => Encoding::Targa,
        "tif" => Encoding::Tiff,
        "webp" => Encoding::WebP,
        _ => Encoding::Png,
    }
}
