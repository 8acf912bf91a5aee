//! texbridge Core Library
//!
//! This crate provides the scene data model, the scene engine interface and
//! the error type shared across all texbridge components.

pub mod engine;
pub mod error;
pub mod types;

pub use engine::{ImageSaveError, SceneEngine};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::engine::{ImageSaveError, SceneEngine};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::types::*;
}
