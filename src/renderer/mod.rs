//! Renderer Module
//!
//! - [`backend`]: the [`RenderBackend`](backend::RenderBackend) capability
//!   trait plus the software and wgpu implementations.
//! - [`shader_gen`]: template expansion and naga validation of programs.
//! - [`target_pool`]: named offscreen targets.
//! - [`pass`]: one full-screen program with its owned uniforms.
//! - [`stages`]: bloom, SMAA and composite.
//! - [`pipeline`]: the per-frame orchestrator.

pub mod backend;
pub mod pass;
pub mod pipeline;
pub mod shader_gen;
pub mod stages;
pub mod target_pool;

pub use pass::{PassDescriptor, PostProcessPass};
pub use pipeline::RenderPipeline;
pub use shader_gen::ShaderGenerator;
pub use target_pool::{RenderTarget, RenderTargetPool, TargetOptions};
