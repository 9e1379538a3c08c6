//! Texture and Render Target Options
//!
//! Backend-agnostic descriptions of how a texture is stored and sampled.
//! [`TextureOptions`] is the resolved, complete description handed to a
//! backend; [`TextureParams`] is a sparse set of overrides (every field
//! optional) applied onto options field by field.
//!
//! ```rust,ignore
//! let mut options = TextureOptions::default();
//! TextureParams::new()
//!     .with_min_filter(FilterMode::Nearest)
//!     .with_mag_filter(FilterMode::Nearest)
//!     .with_generate_mipmaps(false)
//!     .apply_to(&mut options);
//! ```

use glam::Vec4;
use serde::{Deserialize, Serialize};

// ============================================================================
// Enumerations
// ============================================================================

/// Sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Address mode outside the `[0, 1]` UV range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Storage format of a color attachment or texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    #[default]
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
}

impl ColorFormat {
    /// Bytes per texel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8Unorm => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// Whether values are stored clamped to `[0, 1]`.
    #[must_use]
    pub const fn is_normalized(self) -> bool {
        matches!(self, Self::Rgba8Unorm)
    }
}

/// Color space interpretation of 8-bit texel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    /// Data is used as-is (lookup tables, masks).
    #[default]
    Linear,
    /// Data is decoded from sRGB on sample.
    Srgb,
}

impl ColorSpace {
    /// Convert a normalized texel to linear values. Alpha is never encoded.
    #[must_use]
    pub fn to_linear(self, texel: Vec4) -> Vec4 {
        match self {
            Self::Linear => texel,
            Self::Srgb => Vec4::new(
                srgb_to_linear(texel.x),
                srgb_to_linear(texel.y),
                srgb_to_linear(texel.z),
                texel.w,
            ),
        }
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Mip chain policy for a render target or texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MipmapPolicy {
    /// Single level.
    #[default]
    None,
    /// Full chain, regenerated after every write to level 0.
    Generate,
}

/// Number of levels in a full mip chain for the given extent.
#[must_use]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

// ============================================================================
// TextureOptions
// ============================================================================

/// Complete storage + sampling description of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureOptions {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub format: ColorFormat,
    /// Anisotropic filtering clamp (1 = off).
    pub anisotropy: u16,
    pub color_space: ColorSpace,
    /// Flip rows on upload so that row 0 is the bottom of the image.
    pub flip_y: bool,
    pub mipmaps: MipmapPolicy,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            format: ColorFormat::Rgba8Unorm,
            anisotropy: 1,
            color_space: ColorSpace::Linear,
            flip_y: false,
            mipmaps: MipmapPolicy::None,
        }
    }
}

impl TextureOptions {
    /// Single-filter shorthand used by lookup tables.
    #[must_use]
    pub fn filtered(filter: FilterMode) -> Self {
        Self {
            mag_filter: filter,
            min_filter: filter,
            ..Self::default()
        }
    }
}

// ============================================================================
// TextureParams
// ============================================================================

/// Sparse per-texture parameter overrides.
///
/// Unset fields leave the target options untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureParams {
    pub wrap_s: Option<WrapMode>,
    pub wrap_t: Option<WrapMode>,
    pub mag_filter: Option<FilterMode>,
    pub min_filter: Option<FilterMode>,
    pub format: Option<ColorFormat>,
    pub anisotropy: Option<u16>,
    pub color_space: Option<ColorSpace>,
    pub flip_y: Option<bool>,
    pub generate_mipmaps: Option<bool>,
}

impl TextureParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters of the SMAA area lookup: linear, no mips, no flip.
    #[must_use]
    pub fn smaa_area() -> Self {
        Self::new()
            .with_mag_filter(FilterMode::Linear)
            .with_min_filter(FilterMode::Linear)
            .with_generate_mipmaps(false)
            .with_flip_y(false)
    }

    /// Parameters of the SMAA search lookup: nearest, no mips, no flip.
    #[must_use]
    pub fn smaa_search() -> Self {
        Self::new()
            .with_mag_filter(FilterMode::Nearest)
            .with_min_filter(FilterMode::Nearest)
            .with_generate_mipmaps(false)
            .with_flip_y(false)
    }

    #[must_use]
    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap_s = Some(wrap);
        self.wrap_t = Some(wrap);
        self
    }

    #[must_use]
    pub fn with_mag_filter(mut self, filter: FilterMode) -> Self {
        self.mag_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_min_filter(mut self, filter: FilterMode) -> Self {
        self.min_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: ColorFormat) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn with_anisotropy(mut self, anisotropy: u16) -> Self {
        self.anisotropy = Some(anisotropy);
        self
    }

    #[must_use]
    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = Some(color_space);
        self
    }

    #[must_use]
    pub fn with_flip_y(mut self, flip_y: bool) -> Self {
        self.flip_y = Some(flip_y);
        self
    }

    #[must_use]
    pub fn with_generate_mipmaps(mut self, generate: bool) -> Self {
        self.generate_mipmaps = Some(generate);
        self
    }

    /// Write every set field into `options`.
    pub fn apply_to(&self, options: &mut TextureOptions) {
        if let Some(wrap) = self.wrap_s {
            options.wrap_s = wrap;
        }
        if let Some(wrap) = self.wrap_t {
            options.wrap_t = wrap;
        }
        if let Some(filter) = self.mag_filter {
            options.mag_filter = filter;
        }
        if let Some(filter) = self.min_filter {
            options.min_filter = filter;
        }
        if let Some(format) = self.format {
            options.format = format;
        }
        if let Some(anisotropy) = self.anisotropy {
            options.anisotropy = anisotropy.max(1);
        }
        if let Some(color_space) = self.color_space {
            options.color_space = color_space;
        }
        if let Some(flip_y) = self.flip_y {
            options.flip_y = flip_y;
        }
        if let Some(generate) = self.generate_mipmaps {
            options.mipmaps = if generate {
                MipmapPolicy::Generate
            } else {
                MipmapPolicy::None
            };
        }
    }

    /// Resolve against the default options.
    #[must_use]
    pub fn resolve(&self) -> TextureOptions {
        let mut options = TextureOptions::default();
        self.apply_to(&mut options);
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_length() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(384, 216), 9);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn unset_params_leave_options_alone() {
        let mut options = TextureOptions {
            wrap_s: WrapMode::Repeat,
            anisotropy: 8,
            ..TextureOptions::default()
        };
        let before = options;
        TextureParams::new().apply_to(&mut options);
        assert_eq!(options, before);
    }

    #[test]
    fn search_lookup_is_nearest_without_mips() {
        let options = TextureParams::smaa_search().resolve();
        assert_eq!(options.min_filter, FilterMode::Nearest);
        assert_eq!(options.mag_filter, FilterMode::Nearest);
        assert_eq!(options.mipmaps, MipmapPolicy::None);
        assert!(!options.flip_y);
    }
}
