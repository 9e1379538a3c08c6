//! Resource Definitions
//!
//! Backend-independent data used by the pipeline:
//! - settings for bloom, SMAA, composite and the scene target
//! - uniform values and shader defines
//! - texture options and decoded images

pub mod bloom;
pub mod image;
pub mod settings;
pub mod shader_defines;
pub mod smaa;
pub mod texture;
pub mod uniforms;

pub use bloom::{BloomSettings, MAX_BLOOM_LEVELS};
pub use image::DecodedImage;
pub use settings::{CompositeSettings, PipelineSettings, SceneTargetSettings};
pub use shader_defines::ShaderDefines;
pub use smaa::SmaaSettings;
pub use texture::{
    ColorFormat, ColorSpace, FilterMode, MipmapPolicy, TextureOptions, TextureParams, WrapMode,
};
pub use uniforms::{TextureRef, UniformKind, UniformSet, UniformValue};
