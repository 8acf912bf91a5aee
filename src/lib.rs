//! texbridge
//!
//! Converts a 3D asset through a [`SceneEngine`] while normalizing its
//! textures: references are sanitized, every image is re-encoded into a
//! `textures/` directory next to the output, and the scene is exported with
//! all resources embedded.

pub mod config;
pub mod driver;

pub use config::DriverConfig;
pub use driver::{ConversionDriver, ConversionReport, ConversionState, ConversionWarning};

pub use texbridge_core::{Error, ErrorKind, Result, SceneEngine};
