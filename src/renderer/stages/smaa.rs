//! SMAA 1x stage: edge detection, blending weights, neighborhood blending.
//!
//! The weights pass needs two precomputed lookup textures (area and search).
//! They are requested once and polled at the start of every run. Until both
//! are ready the weights pass is skipped and its buffer is cleared to zero,
//! which makes neighborhood blending a plain copy of the scene color.

use glam::Vec4;

use crate::assets::{LoadStatus, TextureLoad};
use crate::errors::Result;
use crate::renderer::backend::{RenderBackend, TargetId, TextureId};
use crate::renderer::pass::{PassDescriptor, PostProcessPass};
use crate::resources::smaa::SmaaSettings;
use crate::resources::texture::TextureParams;
use crate::resources::uniforms::{TextureRef, UniformSet, UniformValue};

/// The two lookup texture requests of the weights pass.
#[derive(Debug)]
pub struct LookupTextures {
    pub area: TextureLoad,
    pub search: TextureLoad,
}

impl LookupTextures {
    /// Ask `backend` to load the files named in `settings`.
    pub fn request<B: RenderBackend + ?Sized>(backend: &mut B, settings: &SmaaSettings) -> Self {
        Self {
            area: backend.load_texture(&settings.area_texture, &TextureParams::smaa_area()),
            search: backend.load_texture(&settings.search_texture, &TextureParams::smaa_search()),
        }
    }
}

enum LookupState {
    Pending(TextureLoad),
    Ready(TextureId),
    Failed,
}

struct LookupSlot {
    uniform: &'static str,
    state: LookupState,
}

impl LookupSlot {
    fn new(uniform: &'static str, load: TextureLoad) -> Self {
        Self {
            uniform,
            state: LookupState::Pending(load),
        }
    }

    /// Advance a pending load. Returns the texture once it became ready.
    fn poll<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> Option<TextureId> {
        let LookupState::Pending(load) = &mut self.state else {
            return None;
        };
        let next = match load.poll() {
            LoadStatus::Pending => return None,
            LoadStatus::Ready(image) => {
                match backend.create_texture(&image, &load.params().resolve()) {
                    Ok(id) => {
                        log::debug!("SMAA lookup '{}' ready", self.uniform);
                        LookupState::Ready(id)
                    }
                    Err(err) => {
                        log::warn!("SMAA lookup '{}' upload failed: {err}", self.uniform);
                        LookupState::Failed
                    }
                }
            }
            LoadStatus::Failed(err) => {
                log::warn!(
                    "SMAA lookup '{}' ({}) failed to load, anti-aliasing disabled: {err}",
                    self.uniform,
                    load.path().display()
                );
                LookupState::Failed
            }
        };
        self.state = next;
        match self.state {
            LookupState::Ready(id) => Some(id),
            _ => None,
        }
    }

    fn is_ready(&self) -> bool {
        matches!(self.state, LookupState::Ready(_))
    }
}

pub struct SmaaStage {
    edge: PostProcessPass,
    weights: PostProcessPass,
    blend: PostProcessPass,
    area: LookupSlot,
    search: LookupSlot,
    /// Edges, then the anti-aliased result.
    scratch: TargetId,
    blend_weights: TargetId,
}

impl SmaaStage {
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        settings: &SmaaSettings,
        lookups: LookupTextures,
        scratch: TargetId,
        blend_weights: TargetId,
        shared: &UniformSet,
    ) -> Result<Self> {
        let defines = settings.defines();
        let metrics = ("SMAA_RT_METRICS", UniformValue::Vec4(Vec4::ONE));

        let edge = PostProcessPass::new(
            backend,
            PassDescriptor::new("smaa_edge")
                .with_defines(defines.clone())
                .with_uniforms(
                    UniformSet::new()
                        .with(metrics.0, metrics.1.clone())
                        .with("sceneTex", UniformValue::Texture(None)),
                ),
            shared,
        )?;

        let weights = PostProcessPass::new(
            backend,
            PassDescriptor::new("smaa_weights")
                .with_defines(defines.clone())
                .with_uniforms(
                    UniformSet::new()
                        .with(metrics.0, metrics.1.clone())
                        .with("edgesTex", UniformValue::Texture(None))
                        .with("areaTex", UniformValue::Texture(None))
                        .with("searchTex", UniformValue::Texture(None)),
                ),
            shared,
        )?;

        let blend = PostProcessPass::new(
            backend,
            PassDescriptor::new("smaa_blend")
                .with_defines(defines)
                .with_uniforms(
                    UniformSet::new()
                        .with(metrics.0, metrics.1)
                        .with("sceneTex", UniformValue::Texture(None))
                        .with("blendTex", UniformValue::Texture(None)),
                ),
            shared,
        )?;

        Ok(Self {
            edge,
            weights,
            blend,
            area: LookupSlot::new("areaTex", lookups.area),
            search: LookupSlot::new("searchTex", lookups.search),
            scratch,
            blend_weights,
        })
    }

    /// Push `(1/w, 1/h, w, h)` into all three passes.
    pub fn set_metrics(&mut self, width: u32, height: u32) {
        let (w, h) = (width as f32, height as f32);
        let metrics = Vec4::new(1.0 / w, 1.0 / h, w, h);
        for pass in [&mut self.edge, &mut self.weights, &mut self.blend] {
            pass.set_uniform("SMAA_RT_METRICS", metrics);
        }
    }

    #[must_use]
    pub fn lookups_ready(&self) -> bool {
        self.area.is_ready() && self.search.is_ready()
    }

    #[must_use]
    pub fn output(&self) -> TargetId {
        self.scratch
    }

    pub fn set_shared_uniform(&mut self, name: &str, value: &UniformValue) {
        for pass in [&mut self.edge, &mut self.weights, &mut self.blend] {
            if pass.uniforms().contains(name) {
                pass.set_uniform(name, value.clone());
            }
        }
    }

    fn poll_lookups<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for slot in [&mut self.area, &mut self.search] {
            if let Some(id) = slot.poll(backend) {
                self.weights.set_uniform(slot.uniform, TextureRef::Texture(id));
            }
        }
    }

    /// Anti-alias `scene`; returns the target holding the result.
    pub fn run<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, scene: TargetId) -> Result<TargetId> {
        self.poll_lookups(backend);

        self.edge.render(
            backend,
            &UniformSet::new().with("sceneTex", scene),
            Some(self.scratch),
        )?;

        if self.lookups_ready() {
            self.weights.render(
                backend,
                &UniformSet::new().with("edgesTex", self.scratch),
                Some(self.blend_weights),
            )?;
        } else {
            let previous = backend.render_target();
            backend.set_render_target(Some(self.blend_weights))?;
            let cleared = backend.clear(Vec4::ZERO);
            backend.set_render_target(previous)?;
            cleared?;
        }

        self.blend.render(
            backend,
            &UniformSet::new()
                .with("sceneTex", scene)
                .with("blendTex", self.blend_weights),
            Some(self.scratch),
        )?;
        Ok(self.scratch)
    }
}
