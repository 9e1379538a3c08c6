//! Bloom Configuration
//!
//! Pure data describing the bloom stage: a bright-pass extraction followed by
//! a chain of separable Gaussian blur levels at progressively smaller
//! resolutions.
//!
//! # Level Resolution
//!
//! Level `i` of `N` renders at
//!
//! ```text
//! round(screen × resolution_ratio / (2 × (i + 1)))   (clamped to ≥ 1)
//! ```
//!
//! so with the defaults a 1920×1080 screen yields 384×216 for level 0 and
//! 77×43 for level 4.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut bloom = BloomSettings::default();
//! bloom.set_render_count(3);
//! bloom.set_threshold(0.8);
//! ```

use serde::{Deserialize, Serialize};

/// Upper bound on the number of blur levels. The composite samples one
/// texture per level plus the scene, and 16 is the portable per-stage limit.
pub const MAX_BLOOM_LEVELS: usize = 15;

/// Bloom stage configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    /// Number of blur levels (`N`).
    ///
    /// Default: `5`
    pub(crate) render_count: usize,

    /// Base resolution of the blur chain relative to the screen.
    ///
    /// Default: `0.4`
    pub(crate) resolution_ratio: f32,

    /// Bright-pass cutoff. Channels below it contribute nothing.
    ///
    /// Default: `0.5`
    pub(crate) threshold: f32,

    /// Scale applied to the blur tap offsets.
    ///
    /// Default: `0.8`
    pub(crate) blur_range: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            render_count: 5,
            resolution_ratio: 0.4,
            threshold: 0.5,
            blur_range: 0.8,
        }
    }
}

impl BloomSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    #[inline]
    #[must_use]
    pub fn resolution_ratio(&self) -> f32 {
        self.resolution_ratio
    }

    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    #[inline]
    #[must_use]
    pub fn blur_range(&self) -> f32 {
        self.blur_range
    }

    /// Sets the number of blur levels. Zero disables the blur chain entirely.
    pub fn set_render_count(&mut self, count: usize) {
        self.render_count = count.min(MAX_BLOOM_LEVELS);
    }

    /// Sets the blur chain base resolution. Non-positive values are ignored.
    pub fn set_resolution_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.resolution_ratio = ratio;
        }
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.max(0.0);
    }

    pub fn set_blur_range(&mut self, range: f32) {
        self.blur_range = range.max(0.0);
    }

    /// Dimensions of blur level `level` for a `width × height` screen.
    #[must_use]
    pub fn level_size(&self, level: usize, width: u32, height: u32) -> (u32, u32) {
        let divisor = 2.0 * (level as f32 + 1.0);
        let scale = |extent: u32| -> u32 {
            ((extent as f32 * self.resolution_ratio / divisor).round() as u32).max(1)
        };
        (scale(width), scale(height))
    }
}
