//! Conversion driver
//!
//! Sequences one conversion job against an exclusively owned scene engine:
//!
//! ```text
//! Init -> Imported -> ReferencesSanitized -> Materialized -> Packed -> Exported -> Verified
//! ```
//!
//! Any fatal error moves the driver to `Failed`. Per-image and pack problems
//! are collected as warnings on the report instead.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use texbridge_core::{EngineStatus, Error, ExportOptions, Result, SceneEngine};
use texbridge_textures::{MaterializationOutcome, MaterializationRecord, ReferenceRewrite, TextureMaterializer};
use tracing::{debug, error, info, warn};

use crate::config::DriverConfig;

/// Driver state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConversionState {
    Init,
    Imported,
    ReferencesSanitized,
    Materialized,
    Packed,
    Exported,
    Verified,
    Failed,
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Non-fatal problem collected during a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionWarning {
    /// An image could not be encoded or written
    Materialization { image: String, reason: String },
    /// The pack step did not finish
    Pack { status: EngineStatus },
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionWarning::Materialization { image, reason } => {
                write!(f, "texture '{}' was not written: {}", image, reason)
            }
            ConversionWarning::Pack { status } => write!(f, "packing resources returned {}", status),
        }
    }
}

/// Result of a successful job
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub output: PathBuf,
    pub texture_dir: PathBuf,
    pub references: Vec<ReferenceRewrite>,
    pub records: Vec<MaterializationRecord>,
    pub warnings: Vec<ConversionWarning>,
}

impl ConversionReport {
    /// Number of textures written to disk
    pub fn written(&self) -> usize {
        self.records.iter().filter(|record| record.outcome.is_success()).count()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Runs conversion jobs against one scene engine
#[derive(Debug)]
pub struct ConversionDriver<E: SceneEngine> {
    engine: E,
    config: DriverConfig,
    state: ConversionState,
}

impl<E: SceneEngine> ConversionDriver<E> {
    /// Create a driver with the default configuration
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, DriverConfig::default())
    }

    pub fn with_config(engine: E, config: DriverConfig) -> Self {
        Self {
            engine,
            config,
            state: ConversionState::Init,
        }
    }

    /// State reached by the last job
    pub fn state(&self) -> ConversionState {
        self.state
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Convert `input` into `output`
    ///
    /// Textures are written to `<output parent>/<texture_dir_name>`. Import,
    /// export and missing-output failures abort the job; everything else is
    /// reported through [`ConversionReport::warnings`].
    pub fn run(&mut self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<ConversionReport> {
        let (input, output) = (input.as_ref(), output.as_ref());
        self.state = ConversionState::Init;

        let result = self.run_stages(input, output);
        if let Err(err) = &result {
            match err.kind() {
                Some(kind) => error!(state = %self.state, kind = %kind, error = %err, "Conversion failed"),
                None => error!(state = %self.state, error = %err, "Conversion failed"),
            }
            self.state = ConversionState::Failed;
        }
        result
    }

    fn run_stages(&mut self, input: &Path, output: &Path) -> Result<ConversionReport> {
        self.config.validate()?;
        info!(input = %input.display(), output = %output.display(), "Starting conversion");

        if !input.is_file() {
            return Err(Error::ImportFailed {
                path: input.to_path_buf(),
                status: EngineStatus::cancelled("input file does not exist"),
            });
        }
        let status = self.engine.import_scene(input);
        if !status.is_finished() {
            return Err(Error::ImportFailed {
                path: input.to_path_buf(),
                status,
            });
        }
        self.advance(ConversionState::Imported);

        let references = TextureMaterializer::sanitize_references(&mut self.engine);
        self.advance(ConversionState::ReferencesSanitized);

        let texture_dir = output
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.config.texture_dir_name);
        let mut materializer = TextureMaterializer::new(&texture_dir);
        let records = materializer.materialize(&mut self.engine);
        let mut warnings: Vec<ConversionWarning> = records
            .iter()
            .filter_map(|record| match &record.outcome {
                MaterializationOutcome::Failed { reason } => Some(ConversionWarning::Materialization {
                    image: record.image_name.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect();
        self.log_unreferenced_images();
        self.advance(ConversionState::Materialized);

        if self.config.pack_resources {
            let status = self.engine.pack_all_resources();
            if !status.is_finished() {
                warn!(status = %status, "Packing resources did not finish, exporting anyway");
                warnings.push(ConversionWarning::Pack { status });
            }
        } else {
            debug!("Pack step disabled");
        }
        self.advance(ConversionState::Packed);

        let status = self.engine.export_scene(output, &ExportOptions::embed_all());
        if !status.is_finished() {
            return Err(Error::ExportFailed {
                path: output.to_path_buf(),
                status,
            });
        }
        self.advance(ConversionState::Exported);

        if !output.exists() {
            return Err(Error::OutputMissing(output.to_path_buf()));
        }
        self.advance(ConversionState::Verified);

        let report = ConversionReport {
            output: output.to_path_buf(),
            texture_dir: materializer.texture_dir().to_path_buf(),
            references,
            records,
            warnings,
        };
        info!(
            output = %output.display(),
            textures = report.written(),
            warnings = report.warnings.len(),
            "Conversion complete"
        );
        Ok(report)
    }

    fn advance(&mut self, next: ConversionState) {
        info!(from = %self.state, to = %next, "State transition");
        self.state = next;
    }

    /// Materials are only inspected; nothing is rewired
    fn log_unreferenced_images(&self) {
        let materials = self.engine.materials();
        for (index, image) in self.engine.images().iter().enumerate() {
            if !materials.iter().any(|material| material.references_image(index)) {
                debug!(image = %image.name, index, "Image is not used by any material");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let warning = ConversionWarning::Materialization {
            image: "Wood Tile".into(),
            reason: "disk full".into(),
        };
        assert_eq!(warning.to_string(), "texture 'Wood Tile' was not written: disk full");

        let warning = ConversionWarning::Pack {
            status: EngineStatus::cancelled("no data"),
        };
        assert_eq!(warning.to_string(), "packing resources returned CANCELLED (no data)");
    }

    #[test]
    fn test_warning_json() {
        let warning = ConversionWarning::Materialization {
            image: "albedo".into(),
            reason: "boom".into(),
        };
        let value = serde_json::to_value(&warning).unwrap();
        assert_eq!(value["kind"], "materialization");
        assert_eq!(value["image"], "albedo");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConversionState::ReferencesSanitized.to_string(), "ReferencesSanitized");
    }
}
