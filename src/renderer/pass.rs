//! Post-Process Pass
//!
//! One full-screen program plus the uniforms it owns. The driving stage
//! mutates those uniforms between draws; per-call inputs passed to
//! [`PostProcessPass::render`] are overlaid for that draw only.

use std::borrow::Cow;

use crate::errors::Result;
use crate::renderer::backend::{ProgramId, ProgramInterface, ProgramSource, RenderBackend, TargetId};
use crate::renderer::shader_gen::ShaderGenerator;
use crate::resources::shader_defines::ShaderDefines;
use crate::resources::uniforms::{UniformSet, UniformValue};

/// Everything needed to build a [`PostProcessPass`].
#[derive(Debug, Clone)]
pub struct PassDescriptor {
    /// Program label; also the default fragment template name.
    pub label: String,
    /// Vertex template; `None` uses the full-screen triangle.
    pub vertex: Option<String>,
    pub fragment: String,
    pub uniforms: UniformSet,
    pub defines: ShaderDefines,
}

impl PassDescriptor {
    /// A pass whose fragment template is named after its label.
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            vertex: None,
            fragment: label.to_string(),
            uniforms: UniformSet::new(),
            defines: ShaderDefines::new(),
        }
    }

    #[must_use]
    pub fn with_uniforms(mut self, uniforms: UniformSet) -> Self {
        self.uniforms = uniforms;
        self
    }

    #[must_use]
    pub fn with_defines(mut self, defines: ShaderDefines) -> Self {
        self.defines = defines;
        self
    }
}

pub struct PostProcessPass {
    label: String,
    program: ProgramId,
    interface: ProgramInterface,
    defines: ShaderDefines,
    uniforms: UniformSet,
}

impl PostProcessPass {
    /// Generate and compile the pass program.
    ///
    /// `shared` values are copied in for every name the descriptor does not
    /// set itself. Compilation failures are returned as-is and are fatal for
    /// the owning pipeline.
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        descriptor: PassDescriptor,
        shared: &UniformSet,
    ) -> Result<Self> {
        let PassDescriptor {
            label,
            vertex,
            fragment,
            mut uniforms,
            defines,
        } = descriptor;
        uniforms.merge_missing(shared);

        let interface = ProgramInterface::from_uniforms(&uniforms);
        let source = ShaderGenerator::generate(&label, vertex.as_deref(), &fragment, &defines, &interface)?;
        let program = backend.compile_program(&ProgramSource {
            label: label.clone(),
            source,
            defines: defines.clone(),
            interface: interface.clone(),
        })?;

        Ok(Self {
            label,
            program,
            interface,
            defines,
            uniforms,
        })
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> ProgramId {
        self.program
    }

    #[inline]
    #[must_use]
    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    #[inline]
    #[must_use]
    pub fn defines(&self) -> &ShaderDefines {
        &self.defines
    }

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> &UniformSet {
        &self.uniforms
    }

    #[inline]
    pub fn uniforms_mut(&mut self) -> &mut UniformSet {
        &mut self.uniforms
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        self.uniforms.set(name, value);
    }

    /// Draw once into `output` (`None` = default framebuffer), then rebind
    /// whatever target was bound before.
    pub fn render<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        inputs: &UniformSet,
        output: Option<TargetId>,
    ) -> Result<()> {
        let uniforms = if inputs.is_empty() {
            Cow::Borrowed(&self.uniforms)
        } else {
            let mut merged = self.uniforms.clone();
            merged.merge(inputs);
            Cow::Owned(merged)
        };

        let previous = backend.render_target();
        backend.set_render_target(output)?;
        log::trace!("Pass '{}' -> {output:?}", self.label);
        let drawn = backend.draw_fullscreen(self.program, &uniforms);
        let restored = backend.set_render_target(previous);
        drawn.and(restored)
    }
}
