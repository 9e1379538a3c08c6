//! Composite stage: anti-aliased color plus weighted bloom levels.

use crate::errors::Result;
use crate::renderer::backend::{RenderBackend, TargetId};
use crate::renderer::pass::{PassDescriptor, PostProcessPass};
use crate::resources::settings::CompositeSettings;
use crate::resources::shader_defines::ShaderDefines;
use crate::resources::uniforms::{TextureRef, UniformSet, UniformValue};

pub struct CompositeStage {
    pass: PostProcessPass,
    render_count: usize,
}

impl CompositeStage {
    /// Compile the composite for exactly `bloom_levels.len()` bloom inputs.
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        settings: &CompositeSettings,
        bloom_levels: Vec<TextureRef>,
        shared: &UniformSet,
    ) -> Result<Self> {
        let render_count = bloom_levels.len();
        let mut defines = ShaderDefines::new();
        defines.set("RENDER_COUNT", &render_count.to_string());

        let pass = PostProcessPass::new(
            backend,
            PassDescriptor::new("composite")
                .with_defines(defines)
                .with_uniforms(
                    UniformSet::new()
                        .with("brightness", settings.brightness)
                        .with("sceneTex", UniformValue::Texture(None))
                        .with("bloomTexs", bloom_levels),
                ),
            shared,
        )?;

        Ok(Self { pass, render_count })
    }

    #[must_use]
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    pub fn set_shared_uniform(&mut self, name: &str, value: &UniformValue) {
        if self.pass.uniforms().contains(name) {
            self.pass.set_uniform(name, value.clone());
        }
    }

    pub fn run<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        color: TargetId,
        bloom_levels: Vec<TextureRef>,
        output: Option<TargetId>,
    ) -> Result<()> {
        self.pass.render(
            backend,
            &UniformSet::new()
                .with("sceneTex", color)
                .with("bloomTexs", bloom_levels),
            output,
        )
    }
}
