//! Configuration system
//!
//! Settings are plain serde structs that can be loaded from or saved to TOML
//! or RON files, selected by file extension.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

use crate::render::layer::Resolution;
use crate::render::renderer::ShaderId;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match extension(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents)?;
        Ok(())
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Scene-wide render settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Reference resolution all game coordinates are expressed in
    pub virtual_resolution: Resolution,

    /// Shader used by entities that do not request one
    pub default_shader: ShaderId,

    /// Initial capacity reserved for each batch before high-water marks exist
    pub batch_capacity_hint: usize,

    /// Run the render-order cycle detector over every display list (debug builds only)
    pub detect_order_cycles: bool,

    /// Include the debug-draw entities of enabled areas in display lists
    pub draw_area_debug: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            virtual_resolution: Resolution::new(320, 200),
            default_shader: ShaderId::DEFAULT,
            batch_capacity_hint: 64,
            detect_order_cycles: false,
            draw_area_debug: true,
        }
    }
}

impl Config for RenderSettings {}
