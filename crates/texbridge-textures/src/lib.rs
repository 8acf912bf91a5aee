//! Texture normalization and materialization
//!
//! Turns the image resources of an imported scene into files a format
//! exporter can embed:
//! - format inference from declared formats and file paths
//! - filesystem-safe, collision-free texture names
//! - re-encoding and writing each image, with per-image failure tracking

mod encoder;
mod format;
mod materializer;
mod naming;

pub use encoder::{TextureEncoder, EncodeOptions};
pub use format::{extension_to_encoding, infer_extension, Encoding, TextureExtension};
pub use materializer::{
    MaterializationOutcome, MaterializationRecord, ReferenceRewrite, TextureMaterializer,
};
pub use naming::{base_name_for, fallback_name, sanitize, strip_extension, NameRegistry};

use thiserror::Error;

/// Texture encoding errors
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

pub type TextureResult<T> = Result<T, TextureError>;
