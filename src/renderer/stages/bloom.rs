//! Bloom stage: bright extraction followed by ping-pong blur levels.

use crate::errors::Result;
use crate::renderer::backend::{RenderBackend, TargetId};
use crate::renderer::pass::{PassDescriptor, PostProcessPass};
use crate::renderer::target_pool::{RenderTargetPool, TargetOptions};
use crate::resources::bloom::BloomSettings;
use crate::resources::uniforms::{TextureRef, UniformSet, UniformValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BloomLevel {
    /// Horizontal blur output.
    horizontal: TargetId,
    /// Vertical blur output; the level's result.
    vertical: TargetId,
}

/// Names of the two buffers of blur level `level`.
#[must_use]
pub fn level_target_names(level: usize) -> (String, String) {
    (format!("bloom{level}_h"), format!("bloom{level}_v"))
}

pub struct BloomStage {
    settings: BloomSettings,
    bright: PostProcessPass,
    blur: PostProcessPass,
    bright_target: TargetId,
    levels: Vec<BloomLevel>,
}

impl BloomStage {
    /// Build both passes and allocate the level buffers as 1×1 placeholders.
    ///
    /// `bright_target` receives the bright pass; it is shared scratch space
    /// owned by the pipeline.
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        pool: &mut RenderTargetPool,
        settings: BloomSettings,
        bright_target: TargetId,
        shared: &UniformSet,
    ) -> Result<Self> {
        let bright = PostProcessPass::new(
            backend,
            PassDescriptor::new("bloom_bright").with_uniforms(
                UniformSet::new()
                    .with("threshold", settings.threshold())
                    .with("sceneTex", UniformValue::Texture(None)),
            ),
            shared,
        )?;

        let blur = PostProcessPass::new(
            backend,
            PassDescriptor::new("bloom_blur").with_uniforms(
                UniformSet::new()
                    .with("backbuffer", UniformValue::Texture(None))
                    .with("blurRange", settings.blur_range())
                    .with("renderCount", settings.render_count() as f32)
                    .with("count", 0.0_f32)
                    .with("direction", false),
            ),
            shared,
        )?;

        let mut levels = Vec::with_capacity(settings.render_count());
        for level in 0..settings.render_count() {
            let (h_name, v_name) = level_target_names(level);
            // Both blurs sample level 0 only, so neither buffer carries a mip chain.
            let horizontal = pool.allocate(backend, &h_name, 1, 1, TargetOptions::default())?;
            let vertical = pool.allocate(backend, &v_name, 1, 1, TargetOptions::default())?;
            levels.push(BloomLevel {
                horizontal,
                vertical,
            });
        }

        Ok(Self {
            settings,
            bright,
            blur,
            bright_target,
            levels,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &BloomSettings {
        &self.settings
    }

    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Per-level sizes for a `width × height` screen.
    #[must_use]
    pub fn level_sizes(&self, width: u32, height: u32) -> Vec<(u32, u32)> {
        (0..self.levels.len())
            .map(|level| self.settings.level_size(level, width, height))
            .collect()
    }

    /// Resize both buffers of every level; `sizes` comes from [`level_sizes`](Self::level_sizes).
    pub fn apply_sizes<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        pool: &mut RenderTargetPool,
        sizes: &[(u32, u32)],
    ) -> Result<()> {
        for (level, &(width, height)) in sizes.iter().enumerate() {
            let (h_name, v_name) = level_target_names(level);
            pool.resize(backend, &h_name, width, height)?;
            pool.resize(backend, &v_name, width, height)?;
        }
        Ok(())
    }

    /// Level outputs in level order.
    #[must_use]
    pub fn outputs(&self) -> Vec<TextureRef> {
        self.levels
            .iter()
            .map(|level| TextureRef::Target(level.vertical))
            .collect()
    }

    pub fn set_shared_uniform(&mut self, name: &str, value: &UniformValue) {
        for pass in [&mut self.bright, &mut self.blur] {
            if pass.uniforms().contains(name) {
                pass.set_uniform(name, value.clone());
            }
        }
    }

    /// Run the bright pass and every blur level over `scene`.
    pub fn run<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: TargetId,
    ) -> Result<Vec<TextureRef>> {
        self.bright.render(
            backend,
            &UniformSet::new().with("sceneTex", scene),
            Some(self.bright_target),
        )?;

        let none = UniformSet::new();
        let mut source = self.bright_target;
        for (i, level) in self.levels.iter().enumerate() {
            self.blur.set_uniform("count", i as f32);

            self.blur.set_uniform("direction", true);
            self.blur.set_uniform("backbuffer", source);
            self.blur.render(backend, &none, Some(level.horizontal))?;

            self.blur.set_uniform("direction", false);
            self.blur.set_uniform("backbuffer", level.horizontal);
            self.blur.render(backend, &none, Some(level.vertical))?;

            source = level.vertical;
        }
        Ok(self.outputs())
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3, Vec4};

    use super::*;
    use crate::renderer::backend::software::{RasterCamera, SoftwareBackend};
    use crate::resources::texture::MipmapPolicy;

    fn stage(backend: &mut SoftwareBackend, pool: &mut RenderTargetPool) -> (BloomStage, TargetId, TargetId) {
        let scene = pool
            .allocate(backend, "scene", 16, 8, TargetOptions::default())
            .unwrap();
        let scratch = pool
            .allocate(backend, "scratch", 16, 8, TargetOptions::default())
            .unwrap();
        let mut settings = BloomSettings::default();
        settings.set_render_count(2);
        let bloom = BloomStage::new(backend, pool, settings, scratch, &UniformSet::new()).unwrap();
        (bloom, scene, scratch)
    }

    #[test]
    fn bright_pass_keeps_only_texels_above_threshold() {
        let mut backend = SoftwareBackend::new(16, 8);
        let mut pool = RenderTargetPool::new();
        let (mut bloom, scene, scratch) = stage(&mut backend, &mut pool);

        let split = |p: Vec2| {
            if p.x < 0.5 { Vec4::new(0.9, 0.9, 0.9, 1.0) } else { Vec4::new(0.4, 0.4, 0.4, 1.0) }
        };
        backend.set_render_target(Some(scene)).unwrap();
        backend.render_scene(&split, &RasterCamera::default()).unwrap();
        bloom.run(&mut backend, scene).unwrap();

        let bright = backend.read_pixels(Some(scratch)).unwrap();
        for y in 0..8 {
            assert!(bright.get(0, y).truncate().min_element() > 0.0);
            assert_eq!(bright.get(15, y).truncate(), Vec3::ZERO);
        }
    }

    #[test]
    fn gray_scene_extracts_nothing() {
        let mut backend = SoftwareBackend::new(16, 8);
        let mut pool = RenderTargetPool::new();
        let (mut bloom, scene, scratch) = stage(&mut backend, &mut pool);

        let gray = |_: Vec2| Vec4::new(0.4, 0.4, 0.4, 1.0);
        backend.set_render_target(Some(scene)).unwrap();
        backend.render_scene(&gray, &RasterCamera::default()).unwrap();
        bloom.run(&mut backend, scene).unwrap();

        let bright = backend.read_pixels(Some(scratch)).unwrap();
        assert!(bright.pixels().iter().all(|p| p.truncate() == Vec3::ZERO));
        assert_eq!(backend.draws()[0].program, "bloom_bright");
        assert_eq!(backend.draws()[0].target, Some(scratch));
        // The first blur reads the bright output.
        assert_eq!(backend.draws()[1].inputs, vec![Some(TextureRef::Target(scratch))]);
    }

    #[test]
    fn level_buffers_carry_no_mip_chain() {
        let mut backend = SoftwareBackend::new(16, 8);
        let mut pool = RenderTargetPool::new();
        let (bloom, _, _) = stage(&mut backend, &mut pool);

        assert_eq!(bloom.level_count(), 2);
        for level in 0..bloom.level_count() {
            let (h_name, v_name) = level_target_names(level);
            for name in [h_name, v_name] {
                let id = pool.get(&name).unwrap();
                assert_eq!(backend.target_desc(id).unwrap().mipmaps, MipmapPolicy::None, "{name}");
            }
        }
    }
}
