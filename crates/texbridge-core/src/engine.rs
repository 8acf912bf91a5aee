//! Scene engine interface
//!
//! The engine owns the imported scene and everything the pipeline does not
//! reimplement: container parsing, pixel decoding, packing and export. The
//! conversion driver holds one engine exclusively for the duration of a job.

use std::path::Path;

use thiserror::Error;

use crate::types::{EngineStatus, ExportOptions, ImageResource, MaterialResource};

/// Reasons a single image could not be encoded and written
#[derive(Error, Debug)]
pub enum ImageSaveError {
    #[error("Image index {0} is out of range")]
    NotFound(usize),

    #[error("No pixel data available")]
    NoPixelData,

    #[error("No output path set")]
    MissingTarget,

    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operations the texture pipeline and the conversion driver need from a scene engine
pub trait SceneEngine {
    /// Load the asset at `path`, replacing any previously loaded scene
    fn import_scene(&mut self, path: &Path) -> EngineStatus;

    /// Image resources in enumeration order
    fn images(&self) -> &[ImageResource];

    fn image_mut(&mut self, index: usize) -> Option<&mut ImageResource>;

    /// Material summaries, for inspection only
    fn materials(&self) -> Vec<MaterialResource>;

    /// Encode the image with its current `file_format` and write it to its `pending_path`
    fn save_image(&mut self, index: usize) -> Result<(), ImageSaveError>;

    /// Pull every file-based resource into the scene so the exporter can embed it
    fn pack_all_resources(&mut self) -> EngineStatus;

    fn export_scene(&mut self, path: &Path, options: &ExportOptions) -> EngineStatus;
}
