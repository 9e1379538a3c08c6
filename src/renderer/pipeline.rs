//! Render Pipeline
//!
//! [`RenderPipeline`] owns the target pool and the three post-process stages
//! and drives one frame:
//!
//! ```text
//! render(scene, camera, output)
//!   1. scene        → "scene"                 (previous target restored)
//!   2. bloom        "scene" → "scratch" → bloom{i}_h → bloom{i}_v
//!   3. smaa         "scene" → "scratch" (edges) → "blend_weights" → "scratch"
//!   4. composite    "scratch" + bloom{i}_v → output
//! ```
//!
//! Steps 2-4 run with the backend's auto-clear disabled; the previous value
//! is restored afterwards whether or not the frame succeeded.
//!
//! All targets start as 1×1 placeholders. The pipeline refuses to render
//! until [`resize`](RenderPipeline::resize) has succeeded once.

use std::marker::PhantomData;

use crate::errors::{AfterglowError, Result};
use crate::renderer::backend::{RenderBackend, TargetId};
use crate::renderer::stages::{BloomStage, CompositeStage, LookupTextures, SmaaStage};
use crate::renderer::target_pool::{RenderTargetPool, TargetOptions};
use crate::resources::settings::PipelineSettings;
use crate::resources::uniforms::{TextureRef, UniformSet, UniformValue};

/// Primary scene target.
pub const SCENE_TARGET: &str = "scene";
/// Bright pass, SMAA edges and the anti-aliased result.
pub const SCRATCH_TARGET: &str = "scratch";
/// SMAA blending weights.
pub const BLEND_WEIGHTS_TARGET: &str = "blend_weights";

pub struct RenderPipeline<B: RenderBackend + ?Sized> {
    settings: PipelineSettings,
    pool: RenderTargetPool,
    scene_target: TargetId,
    bloom: BloomStage,
    smaa: SmaaStage,
    composite: CompositeStage,
    size: Option<(u32, u32)>,
    _backend: PhantomData<fn(&mut B)>,
}

impl<B: RenderBackend + ?Sized> RenderPipeline<B> {
    /// Build the pipeline and request the SMAA lookup textures named in
    /// `settings` through [`RenderBackend::load_texture`].
    pub fn new(backend: &mut B, settings: PipelineSettings, parent_uniforms: &UniformSet) -> Result<Self> {
        settings.validate()?;
        let lookups = LookupTextures::request(backend, &settings.smaa);
        Self::with_lookups(backend, settings, parent_uniforms, lookups)
    }

    /// Build the pipeline with caller-supplied lookup texture requests.
    pub fn with_lookups(
        backend: &mut B,
        settings: PipelineSettings,
        parent_uniforms: &UniformSet,
        lookups: LookupTextures,
    ) -> Result<Self> {
        settings.validate()?;
        let mut pool = RenderTargetPool::new();

        let scene_target = pool.allocate(
            backend,
            SCENE_TARGET,
            1,
            1,
            TargetOptions::default()
                .with_depth(settings.scene.depth_buffer)
                .with_format(settings.scene.color_format),
        )?;
        let scratch = pool.allocate(backend, SCRATCH_TARGET, 1, 1, TargetOptions::default())?;
        let blend_weights =
            pool.allocate(backend, BLEND_WEIGHTS_TARGET, 1, 1, TargetOptions::default())?;

        let bloom = BloomStage::new(backend, &mut pool, settings.bloom, scratch, parent_uniforms)?;
        let smaa = SmaaStage::new(
            backend,
            &settings.smaa,
            lookups,
            scratch,
            blend_weights,
            parent_uniforms,
        )?;
        let composite =
            CompositeStage::new(backend, &settings.composite, bloom.outputs(), parent_uniforms)?;

        log::debug!(
            "Render pipeline built: {} bloom levels, {} targets",
            bloom.level_count(),
            pool.len()
        );

        Ok(Self {
            settings,
            pool,
            scene_target,
            bloom,
            smaa,
            composite,
            size: None,
            _backend: PhantomData,
        })
    }

    /// Render one frame into `output` (`None` = default framebuffer).
    pub fn render(
        &mut self,
        backend: &mut B,
        scene: &B::Scene,
        camera: &B::Camera,
        output: Option<TargetId>,
    ) -> Result<()> {
        if self.size.is_none() {
            return Err(AfterglowError::NotSized);
        }

        let previous = backend.render_target();
        backend.set_render_target(Some(self.scene_target))?;
        let rendered = backend.render_scene(scene, camera);
        let restored = backend.set_render_target(previous);
        rendered.and(restored)?;

        let auto_clear = backend.auto_clear();
        backend.set_auto_clear(false);
        let result = self.post_process(backend, output);
        backend.set_auto_clear(auto_clear);
        result?;

        backend.flush()
    }

    fn post_process(&mut self, backend: &mut B, output: Option<TargetId>) -> Result<()> {
        let blooms = self.bloom.run(backend, self.scene_target)?;
        let color = self.smaa.run(backend, self.scene_target)?;
        self.composite.run(backend, color, blooms, output)
    }

    /// Resize every target to match a `width × height` output.
    ///
    /// Zero dimensions are clamped to 1. If any target fails to resize the
    /// pipeline becomes unsized and refuses to render until the next
    /// successful call.
    pub fn resize(&mut self, backend: &mut B, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            log::warn!("Render pipeline resized to {width}x{height}; clamping to at least 1x1");
        }
        let (width, height) = (width.max(1), height.max(1));

        let level_sizes = self.bloom.level_sizes(width, height);

        let applied = self.apply_size(backend, width, height, &level_sizes);
        if let Err(err) = applied {
            self.size = None;
            return Err(err);
        }

        self.smaa.set_metrics(width, height);
        self.size = Some((width, height));
        log::info!("Render pipeline resized to {width}x{height}");
        Ok(())
    }

    fn apply_size(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
        level_sizes: &[(u32, u32)],
    ) -> Result<()> {
        for name in [SCENE_TARGET, SCRATCH_TARGET, BLEND_WEIGHTS_TARGET] {
            self.pool.resize(backend, name, width, height)?;
        }
        self.bloom.apply_sizes(backend, &mut self.pool, level_sizes)
    }

    /// Copy a parent uniform into every pass that declares it.
    pub fn set_shared_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        self.bloom.set_shared_uniform(name, &value);
        self.smaa.set_shared_uniform(name, &value);
        self.composite.set_shared_uniform(name, &value);
    }

    /// Output size of the last successful resize.
    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    #[must_use]
    pub fn pool(&self) -> &RenderTargetPool {
        &self.pool
    }

    #[must_use]
    pub fn lookups_ready(&self) -> bool {
        self.smaa.lookups_ready()
    }

    /// Bloom level outputs, one per level.
    #[must_use]
    pub fn bloom_outputs(&self) -> Vec<TextureRef> {
        self.bloom.outputs()
    }

    /// Target holding the anti-aliased scene after a render.
    #[must_use]
    pub fn aa_output(&self) -> TargetId {
        self.smaa.output()
    }

    #[must_use]
    pub fn scene_target(&self) -> TargetId {
        self.scene_target
    }
}
