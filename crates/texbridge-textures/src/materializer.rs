//! Texture materializer
//!
//! Two passes over a scene's images, both in the engine's enumeration order:
//!
//! - [`TextureMaterializer::sanitize_references`] rewrites every file-backed
//!   image's reference to `<safe_name>.<ext>` without touching the disk.
//! - [`TextureMaterializer::materialize`] encodes every file-backed or
//!   generated image with real pixels into the texture directory and points
//!   the image at the written file.
//!
//! A failing image never stops the batch: its outcome is recorded and the
//! next image is processed.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use texbridge_core::{ImageSaveError, ImageSource, SceneEngine};
use tracing::{debug, info, trace, warn};

use crate::format::{infer_extension, Encoding, TextureExtension};
use crate::naming::{base_name_for, NameRegistry};

/// Result of processing one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MaterializationOutcome {
    Succeeded,
    /// The engine had no pixel data for an image that looked valid
    SkippedInvalid { reason: String },
    Failed { reason: String },
}

impl MaterializationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MaterializationOutcome::Succeeded)
    }
}

/// What happened to one image during the materialization pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializationRecord {
    /// Position in the engine's enumeration order
    pub index: usize,
    pub image_name: String,
    pub extension: TextureExtension,
    pub encoding: Encoding,
    pub base_name: String,
    /// Final file name after collision resolution
    pub file_name: String,
    pub path: PathBuf,
    pub outcome: MaterializationOutcome,
}

/// Reference assigned by the reference-sanitization pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceRewrite {
    pub index: usize,
    pub image_name: String,
    pub reference: String,
}

/// Writes a scene's textures into one directory with collision-free names
#[derive(Debug)]
pub struct TextureMaterializer {
    texture_dir: PathBuf,
    registry: NameRegistry,
}

impl TextureMaterializer {
    /// Create a materializer for one job; relative directories are made absolute
    pub fn new(texture_dir: impl AsRef<Path>) -> Self {
        let texture_dir = texture_dir.as_ref();
        Self {
            texture_dir: std::path::absolute(texture_dir).unwrap_or_else(|_| texture_dir.to_path_buf()),
            registry: NameRegistry::new(),
        }
    }

    pub fn texture_dir(&self) -> &Path {
        &self.texture_dir
    }

    /// Names assigned so far in this job
    pub fn registry(&self) -> &NameRegistry {
        &self.registry
    }

    /// Rewrite the reference of every file-backed image to `<safe_name>.<ext>`
    ///
    /// Running the pass again on the same scene assigns the same references.
    pub fn sanitize_references<E: SceneEngine + ?Sized>(engine: &mut E) -> Vec<ReferenceRewrite> {
        let mut rewrites = Vec::new();

        for index in 0..engine.images().len() {
            let Some(image) = engine.image_mut(index) else {
                continue;
            };
            if image.source != ImageSource::File {
                continue;
            }

            let ext = infer_extension(image.file_format.as_deref(), image.filepath.as_deref());
            let reference = format!("{}.{}", base_name_for(&image.name, index), ext);
            trace!(image = %image.name, reference = %reference, "Rewriting image reference");
            image.filepath = Some(reference.clone());

            rewrites.push(ReferenceRewrite {
                index,
                image_name: image.name.clone(),
                reference,
            });
        }

        rewrites
    }

    /// Encode and write every eligible image, returning one record per image written or attempted
    ///
    /// Images that are packed or have a zero dimension are skipped without a record.
    pub fn materialize<E: SceneEngine + ?Sized>(&mut self, engine: &mut E) -> Vec<MaterializationRecord> {
        let dir_error = fs::create_dir_all(&self.texture_dir).err().map(|err| {
            warn!(dir = %self.texture_dir.display(), error = %err, "Cannot create texture directory");
            format!("cannot create texture directory: {err}")
        });

        let mut records = Vec::new();

        for index in 0..engine.images().len() {
            let image = &engine.images()[index];
            if !image.source.is_materializable() {
                trace!(image = %image.name, source = %image.source, "Skipping non-materializable image");
                continue;
            }
            if !image.has_pixels() {
                debug!(image = %image.name, width = image.width, height = image.height, "Skipping empty image");
                continue;
            }

            let image_name = image.name.clone();
            let extension = infer_extension(image.file_format.as_deref(), image.filepath.as_deref());
            let encoding = extension.encoding();
            let base_name = base_name_for(&image_name, index);
            let file_name = self.registry.claim(&base_name, extension.as_str());
            let path = self.texture_dir.join(&file_name);

            let outcome = match &dir_error {
                Some(reason) => MaterializationOutcome::Failed { reason: reason.clone() },
                None => Self::write_image(engine, index, &path, encoding),
            };

            match &outcome {
                MaterializationOutcome::Succeeded => {
                    debug!(image = %image_name, path = %path.display(), encoding = %encoding, "Materialized texture");
                }
                MaterializationOutcome::SkippedInvalid { reason } => {
                    debug!(image = %image_name, reason = %reason, "Skipped texture without pixel data");
                }
                MaterializationOutcome::Failed { reason } => {
                    warn!(image = %image_name, reason = %reason, "Failed to materialize texture");
                }
            }

            records.push(MaterializationRecord {
                index,
                image_name,
                extension,
                encoding,
                base_name,
                file_name,
                path,
                outcome,
            });
        }

        let written = records.iter().filter(|r| r.outcome.is_success()).count();
        info!(
            dir = %self.texture_dir.display(),
            written,
            attempted = records.len(),
            "Texture materialization complete"
        );

        records
    }

    fn write_image<E: SceneEngine + ?Sized>(
        engine: &mut E,
        index: usize,
        path: &Path,
        encoding: Encoding,
    ) -> MaterializationOutcome {
        if let Some(image) = engine.image_mut(index) {
            image.pending_path = Some(path.to_path_buf());
            image.file_format = Some(encoding.identifier().to_string());
        }

        match engine.save_image(index) {
            Ok(()) => {
                if let Some(image) = engine.image_mut(index) {
                    image.filepath = Some(path.to_string_lossy().into_owned());
                }
                MaterializationOutcome::Succeeded
            }
            Err(err @ ImageSaveError::NoPixelData) => MaterializationOutcome::SkippedInvalid {
                reason: err.to_string(),
            },
            Err(err) => MaterializationOutcome::Failed {
                reason: err.to_string(),
            },
        }
    }
}
