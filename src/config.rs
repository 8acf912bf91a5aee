//! Conversion driver configuration

use std::fs;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use texbridge_core::{Error, Result, ResultExt};

/// Default name of the texture directory created next to the output
pub const DEFAULT_TEXTURE_DIR: &str = "textures";

/// Settings for one [`ConversionDriver`](crate::ConversionDriver)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Directory name, relative to the output's parent, that receives materialized textures
    pub texture_dir_name: String,
    /// Run the pack step before export
    pub pack_resources: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            texture_dir_name: DEFAULT_TEXTURE_DIR.to_string(),
            pack_resources: true,
        }
    }
}

impl DriverConfig {
    /// Load a JSON configuration file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|err| Error::invalid_config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the texture directory is a single plain path component
    pub fn validate(&self) -> Result<()> {
        let mut components = Path::new(&self.texture_dir_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(Error::invalid_config(format!(
                "texture_dir_name must be a single directory name, got {:?}",
                self.texture_dir_name
            ))),
        }
    }
}
