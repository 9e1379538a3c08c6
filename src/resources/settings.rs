//! Pipeline Settings
//!
//! Aggregates the per-stage settings into one [`PipelineSettings`] value that
//! is fixed when a [`RenderPipeline`](crate::renderer::pipeline::RenderPipeline)
//! is built. Settings can be authored in JSON; every field is optional and
//! falls back to its default.
//!
//! ```json
//! {
//!   "bloom": { "render_count": 3, "threshold": 0.6 },
//!   "composite": { "brightness": 0.25 },
//!   "smaa": { "area_texture": "lut/area.png", "search_texture": "lut/search.png" }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{AfterglowError, Result};
use crate::resources::bloom::{BloomSettings, MAX_BLOOM_LEVELS};
use crate::resources::smaa::{MAX_SEARCH_STEPS_LIMIT, SmaaSettings};
use crate::resources::texture::ColorFormat;

/// Final composite configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeSettings {
    /// Weight of the summed bloom levels added to the anti-aliased color.
    ///
    /// Default: `0.17`
    pub brightness: f32,
}

impl Default for CompositeSettings {
    fn default() -> Self {
        Self { brightness: 0.17 }
    }
}

/// Primary scene target configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneTargetSettings {
    pub depth_buffer: bool,
    pub color_format: ColorFormat,
}

impl Default for SceneTargetSettings {
    fn default() -> Self {
        Self {
            depth_buffer: true,
            color_format: ColorFormat::Rgba8Unorm,
        }
    }
}

/// All settings of a render pipeline. Immutable once the pipeline is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub bloom: BloomSettings,
    pub smaa: SmaaSettings,
    pub composite: CompositeSettings,
    pub scene: SceneTargetSettings,
}

impl PipelineSettings {
    /// Parse and validate settings from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a JSON settings file.
    ///
    /// Relative lookup texture paths are resolved against the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut settings = Self::from_json_str(&text)?;
        if let Some(dir) = path.parent() {
            if settings.smaa.area_texture.is_relative() {
                settings.smaa.area_texture = dir.join(&settings.smaa.area_texture);
            }
            if settings.smaa.search_texture.is_relative() {
                settings.smaa.search_texture = dir.join(&settings.smaa.search_texture);
            }
        }
        Ok(settings)
    }

    /// Check every value against its valid range.
    pub fn validate(&self) -> Result<()> {
        let bloom = &self.bloom;
        if !(bloom.resolution_ratio.is_finite() && bloom.resolution_ratio > 0.0) {
            return Err(AfterglowError::InvalidSettings(format!(
                "bloom.resolution_ratio must be finite and positive, got {}",
                bloom.resolution_ratio
            )));
        }
        if bloom.render_count > MAX_BLOOM_LEVELS {
            return Err(AfterglowError::InvalidSettings(format!(
                "bloom.render_count must be at most {MAX_BLOOM_LEVELS}, got {}",
                bloom.render_count
            )));
        }
        non_negative("bloom.threshold", bloom.threshold)?;
        non_negative("bloom.blur_range", bloom.blur_range)?;
        non_negative("composite.brightness", self.composite.brightness)?;
        non_negative("smaa.threshold", self.smaa.threshold)?;
        non_negative(
            "smaa.local_contrast_adaptation_factor",
            self.smaa.local_contrast_adaptation_factor,
        )?;
        if !(1..=MAX_SEARCH_STEPS_LIMIT).contains(&self.smaa.max_search_steps) {
            return Err(AfterglowError::InvalidSettings(format!(
                "smaa.max_search_steps must be in 1..={MAX_SEARCH_STEPS_LIMIT}, got {}",
                self.smaa.max_search_steps
            )));
        }
        Ok(())
    }
}

fn non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AfterglowError::InvalidSettings(format!(
            "{name} must be finite and non-negative, got {value}"
        )))
    }
}
