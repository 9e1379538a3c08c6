//! SMAA (Subpixel Morphological Anti-Aliasing) Configuration
//!
//! Follows the same pure-data pattern as
//! [`BloomSettings`](super::bloom::BloomSettings). SMAA 1x runs in three
//! passes:
//!
//! ```text
//!  scene ──▶ [edge detection] ──▶ edges
//!  edges + areaTex + searchTex ──▶ [blending weights] ──▶ weights
//!  scene + weights ──▶ [neighborhood blending] ──▶ anti-aliased color
//! ```
//!
//! The two lookup textures are precomputed images shipped alongside the
//! application and loaded once when the pipeline is built.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut smaa = SmaaSettings::default();
//! smaa.set_max_search_steps(16);
//! smaa.area_texture = "assets/smaa/area.png".into();
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resources::shader_defines::ShaderDefines;

/// Width and height (in texels) of the search lookup texture.
pub const SEARCHTEX_SIZE: (u32, u32) = (66, 33);
/// Width and height (in texels) of the area lookup texture.
pub const AREATEX_SIZE: (u32, u32) = (160, 560);
/// Largest edge distance encoded in the area texture.
pub const AREATEX_MAX_DISTANCE: u32 = 16;
/// Height fraction of one sub-texture of the area texture.
pub const AREATEX_SUBTEX_SIZE: f32 = 1.0 / 7.0;
/// Hard upper bound for `max_search_steps`.
pub const MAX_SEARCH_STEPS_LIMIT: u32 = 112;

/// SMAA configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaaSettings {
    /// Luma edge detection threshold.
    ///
    /// Default: `0.1`
    pub(crate) threshold: f32,

    /// How much a dominant neighbouring edge suppresses a weaker one.
    ///
    /// Default: `2.0`
    pub(crate) local_contrast_adaptation_factor: f32,

    /// Maximum texels walked along an edge in each direction.
    ///
    /// Default: `8`
    pub(crate) max_search_steps: u32,

    /// Path of the precomputed area lookup image.
    pub area_texture: PathBuf,

    /// Path of the precomputed search lookup image.
    pub search_texture: PathBuf,
}

impl Default for SmaaSettings {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            local_contrast_adaptation_factor: 2.0,
            max_search_steps: 8,
            area_texture: PathBuf::from("assets/smaa/area.png"),
            search_texture: PathBuf::from("assets/smaa/search.png"),
        }
    }
}

impl SmaaSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    #[inline]
    #[must_use]
    pub fn local_contrast_adaptation_factor(&self) -> f32 {
        self.local_contrast_adaptation_factor
    }

    #[inline]
    #[must_use]
    pub fn max_search_steps(&self) -> u32 {
        self.max_search_steps
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.max(0.0);
    }

    pub fn set_local_contrast_adaptation_factor(&mut self, factor: f32) {
        self.local_contrast_adaptation_factor = factor.max(1.0);
    }

    pub fn set_max_search_steps(&mut self, steps: u32) {
        self.max_search_steps = steps.clamp(1, MAX_SEARCH_STEPS_LIMIT);
    }

    /// Compile-time constants shared by the three SMAA programs.
    #[must_use]
    pub fn defines(&self) -> ShaderDefines {
        let mut defines = ShaderDefines::with_capacity(8);
        defines.set("SMAA_THRESHOLD", &float_literal(self.threshold));
        defines.set(
            "SMAA_LOCAL_CONTRAST_ADAPTATION_FACTOR",
            &float_literal(self.local_contrast_adaptation_factor),
        );
        defines.set("SMAA_MAX_SEARCH_STEPS", &self.max_search_steps.to_string());
        defines.set(
            "SMAA_AREATEX_MAX_DISTANCE",
            &AREATEX_MAX_DISTANCE.to_string(),
        );
        defines.set(
            "SMAA_AREATEX_PIXEL_SIZE_X",
            &float_literal(1.0 / AREATEX_SIZE.0 as f32),
        );
        defines.set(
            "SMAA_AREATEX_PIXEL_SIZE_Y",
            &float_literal(1.0 / AREATEX_SIZE.1 as f32),
        );
        defines.set("SMAA_AREATEX_SUBTEX_SIZE", &float_literal(AREATEX_SUBTEX_SIZE));
        defines.set("SMAA_SEARCHTEX_SIZE_X", &float_literal(SEARCHTEX_SIZE.0 as f32));
        defines.set("SMAA_SEARCHTEX_SIZE_Y", &float_literal(SEARCHTEX_SIZE.1 as f32));
        defines
    }
}

/// Formats a float so it always parses as a floating-point shader literal.
pub(crate) fn float_literal(value: f32) -> String {
    let text = format!("{value:?}");
    if text.contains(['.', 'e', 'E']) || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}
