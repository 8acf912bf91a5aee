//! Scene data model shared across texbridge
//!
//! These types describe what a scene engine exposes to the texture pipeline:
//! image resources, read-only material summaries, operator statuses and the
//! export options handed to the exporter.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How an image resource obtained its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSource {
    /// Backed by an encoded file, either on disk or embedded in the source asset
    File,
    /// Pixel buffer created in memory
    Generated,
    /// Opaque binary blob carried through as-is
    Packed,
}

impl ImageSource {
    /// Whether the materialization pass writes this kind of resource to disk
    pub fn is_materializable(&self) -> bool {
        matches!(self, ImageSource::File | ImageSource::Generated)
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::File => write!(f, "FILE"),
            ImageSource::Generated => write!(f, "GENERATED"),
            ImageSource::Packed => write!(f, "PACKED"),
        }
    }
}

/// One image asset referenced by a scene
///
/// The pixel data itself stays inside the owning engine; this struct only
/// carries the metadata the texture pipeline reads and rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResource {
    /// Label, unique within a scene but not filesystem-safe
    pub name: String,
    pub source: ImageSource,
    /// Declared format or encoder identifier (e.g. `"PNG"`, `"JPEG"`)
    pub file_format: Option<String>,
    /// Internal reference the exporter resolves the image through
    pub filepath: Option<String>,
    /// Where the next `save_image` call writes to
    pub pending_path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

impl ImageResource {
    /// Create a resource with no format, reference or size
    pub fn new(name: impl Into<String>, source: ImageSource) -> Self {
        Self {
            name: name.into(),
            source,
            file_format: None,
            filepath: None,
            pending_path: None,
            width: 0,
            height: 0,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.file_format = Some(format.into());
        self
    }

    pub fn with_filepath(mut self, filepath: impl Into<String>) -> Self {
        self.filepath = Some(filepath.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Placeholder and invalid resources report a zero dimension
    pub fn has_pixels(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Read-only summary of a material
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialResource {
    pub name: String,
    /// Indices into the engine's image enumeration reachable from this material
    pub image_indices: Vec<usize>,
}

impl MaterialResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_indices: Vec::new(),
        }
    }

    pub fn references_image(&self, index: usize) -> bool {
        self.image_indices.contains(&index)
    }
}

/// Outcome of an engine operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Finished,
    Cancelled { reason: String },
}

impl EngineStatus {
    pub fn cancelled(reason: impl Into<String>) -> Self {
        EngineStatus::Cancelled {
            reason: reason.into(),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, EngineStatus::Finished)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Finished => write!(f, "FINISHED"),
            EngineStatus::Cancelled { reason } => write!(f, "CANCELLED ({})", reason),
        }
    }
}

/// How the exporter writes references to file-based resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMode {
    /// Relative when possible, absolute otherwise
    #[default]
    Auto,
    Absolute,
    Relative,
    /// Copy the file next to the exported asset and reference the copy
    Copy,
    /// File name only
    Strip,
}

/// Options passed to `SceneEngine::export_scene`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub bake_animation: bool,
    pub path_mode: PathMode,
    pub embed_textures: bool,
    /// Export only the selected objects
    pub use_selection: bool,
}

impl ExportOptions {
    /// Whole scene, baked animation, every file resource copied and embedded
    pub fn embed_all() -> Self {
        Self {
            bake_animation: true,
            path_mode: PathMode::Copy,
            embed_textures: true,
            use_selection: false,
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::embed_all()
    }
}
