//! glTF 2.0 scene engine
//!
//! An in-process [`SceneEngine`](texbridge_core::SceneEngine) for `.glb` and
//! `.gltf` assets. Meshes, nodes and animations are carried through
//! untouched; images are exposed to the texture pipeline and re-embedded on
//! export.

pub mod container;
mod engine;
pub mod schema;

pub use engine::GltfEngine;
pub use schema::Gltf;

use thiserror::Error;

/// glTF engine errors
#[derive(Debug, Error)]
pub enum GltfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid GLB container: {0}")]
    InvalidGlb(String),

    #[error("Unsupported GLB version: {0}")]
    UnsupportedVersion(u32),

    #[error("Buffer {0} has no data")]
    MissingBuffer(usize),

    #[error("Buffer view {index} is out of range")]
    BufferViewOutOfRange { index: usize },

    #[error("Texture error: {0}")]
    Texture(#[from] texbridge_textures::TextureError),

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedOutput(String),

    #[error("No scene loaded")]
    NoScene,
}

pub type GltfResult<T> = Result<T, GltfError>;
