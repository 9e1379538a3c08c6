#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! # afterglow
//!
//! A multi-pass post-processing pipeline: scene render, ping-pong bloom,
//! SMAA 1x and a final composite, driven over a pluggable
//! [`RenderBackend`](renderer::backend::RenderBackend).
//!
//! ```rust,ignore
//! use afterglow::{PipelineSettings, RenderPipeline, SoftwareBackend, UniformSet};
//!
//! let mut backend = SoftwareBackend::new(640, 360);
//! let mut pipeline = RenderPipeline::new(&mut backend, PipelineSettings::default(), &UniformSet::new())?;
//! pipeline.resize(&mut backend, 640, 360)?;
//! pipeline.render(&mut backend, &scene, &camera, None)?;
//! ```

pub mod assets;
pub mod errors;
pub mod renderer;
pub mod resources;

pub use assets::{AssetEvent, AssetLoader, LoadGroupKind, LoadStatus, TextureLoad};
pub use errors::{AfterglowError, Result};
pub use renderer::backend::gpu::{GpuCamera, WgpuBackend, WgpuScene};
pub use renderer::backend::software::{RasterCamera, RasterScene, SoftwareBackend};
pub use renderer::backend::{RenderBackend, RenderTargetDesc, TargetId, TextureId};
pub use renderer::stages::LookupTextures;
pub use renderer::{PassDescriptor, PostProcessPass, RenderPipeline, RenderTargetPool};
pub use resources::{
    BloomSettings, CompositeSettings, DecodedImage, PipelineSettings, ShaderDefines,
    SmaaSettings, TextureParams, UniformSet, UniformValue,
};
