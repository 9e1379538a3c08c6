//! Render Backend Abstraction
//!
//! The pipeline never talks to a graphics API directly. Everything it needs
//! is expressed by the [`RenderBackend`] capability trait:
//!
//! | Capability | Method |
//! |---|---|
//! | offscreen targets | [`create_render_target`](RenderBackend::create_render_target), [`resize_render_target`](RenderBackend::resize_render_target) |
//! | target binding | [`set_render_target`](RenderBackend::set_render_target), [`render_target`](RenderBackend::render_target) |
//! | scene rendering | [`render_scene`](RenderBackend::render_scene) |
//! | full-screen programs | [`compile_program`](RenderBackend::compile_program), [`draw_fullscreen`](RenderBackend::draw_fullscreen) |
//! | clear state | [`clear`](RenderBackend::clear), [`auto_clear`](RenderBackend::auto_clear) |
//! | textures | [`create_texture`](RenderBackend::create_texture), [`load_texture`](RenderBackend::load_texture) |
//!
//! Two implementations ship with the crate:
//!
//! - [`software::SoftwareBackend`]: deterministic CPU reference.
//! - [`gpu::WgpuBackend`]: GPU backend over `wgpu`.
//!
//! All objects are addressed through generational `slotmap` keys; a stale
//! key resolves to [`AfterglowError::InvalidHandle`] rather than aliasing a
//! newer object.

pub mod software;
pub mod gpu;

use std::path::Path;

use glam::Vec4;
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::assets::TextureLoad;
use crate::errors::{AfterglowError, Result};
use crate::resources::image::DecodedImage;
use crate::resources::shader_defines::ShaderDefines;
use crate::resources::texture::{ColorFormat, FilterMode, MipmapPolicy, TextureOptions, TextureParams};
use crate::resources::uniforms::{TextureRef, UniformKind, UniformSet, UniformValue};

new_key_type! {
    /// Offscreen render target handle.
    pub struct TargetId;
    /// Standalone texture handle.
    pub struct TextureId;
    /// Compiled full-screen program handle.
    pub struct ProgramId;
}

// ============================================================================
// Descriptors
// ============================================================================

/// Allocation parameters of an offscreen render target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    pub depth_buffer: bool,
    pub mipmaps: MipmapPolicy,
    pub filter: FilterMode,
}

impl RenderTargetDesc {
    #[must_use]
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format: ColorFormat::Rgba8Unorm,
            depth_buffer: false,
            mipmaps: MipmapPolicy::None,
            filter: FilterMode::Linear,
        }
    }
}

/// Final program source handed to [`RenderBackend::compile_program`].
#[derive(Debug, Clone)]
pub struct ProgramSource {
    /// Template label; also identifies the program in diagnostics.
    pub label: String,
    /// Fully expanded WGSL module (vertex + fragment entry points).
    pub source: String,
    /// Defines the source was expanded with.
    pub defines: ShaderDefines,
    /// Uniforms the program reads, in binding order.
    pub interface: ProgramInterface,
}

// ============================================================================
// Program interface
// ============================================================================

/// The uniforms a program declares, sorted by name.
///
/// Layout rules shared by every backend:
///
/// ```text
/// @binding(0)          Params { <non-texture uniforms in name order>, _pad }
/// @binding(1 + 2k)     k-th texture (lists expand to name_0 .. name_{n-1})
/// @binding(2 + 2k)     sampler of the k-th texture
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProgramInterface {
    entries: Vec<(String, UniformKind)>,
}

/// Parameter slots and texture bindings resolved for one draw.
#[derive(Debug, Clone, Default)]
pub struct ResolvedBindings {
    /// One 16-byte slot per parameter, followed by the padding slot.
    pub params: Vec<[f32; 4]>,
    /// One entry per flattened texture binding. `None` binds the fallback.
    pub textures: SmallVec<[Option<TextureRef>; 8]>,
}

impl ProgramInterface {
    /// Derive an interface from the uniforms a pass owns.
    #[must_use]
    pub fn from_uniforms(uniforms: &UniformSet) -> Self {
        let mut entries: Vec<(String, UniformKind)> = uniforms
            .iter()
            .map(|(name, value)| (name.to_string(), value.kind()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, UniformKind)> {
        self.entries.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<UniformKind> {
        self.entries
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Non-texture entries, in slot order.
    pub fn params(&self) -> impl Iterator<Item = (&str, UniformKind)> {
        self.iter().filter(|(_, kind)| !kind.is_texture())
    }

    /// Texture binding names after list expansion, in binding order.
    #[must_use]
    pub fn texture_bindings(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (name, kind) in self.iter() {
            match kind {
                UniformKind::Texture => names.push(name.to_string()),
                UniformKind::TextureList(n) => {
                    names.extend((0..n).map(|i| format!("{name}_{i}")));
                }
                _ => {}
            }
        }
        names
    }

    /// Number of 16-byte parameter slots including the padding slot.
    #[must_use]
    pub fn param_slot_count(&self) -> usize {
        self.params().count() + 1
    }

    /// Check `uniforms` against the interface and flatten them for a draw.
    ///
    /// Every declared entry must be present with a matching kind; texture
    /// lists must have exactly the declared length. Values not declared by
    /// the program are ignored. Sampling `output` (the bound target) is
    /// rejected.
    pub fn resolve(
        &self,
        label: &str,
        uniforms: &UniformSet,
        output: Option<TargetId>,
    ) -> Result<ResolvedBindings> {
        let mut bindings = ResolvedBindings {
            params: Vec::with_capacity(self.param_slot_count()),
            textures: SmallVec::new(),
        };

        for (name, kind) in self.iter() {
            let Some(value) = uniforms.get(name) else {
                return Err(binding_error(label, format!("uniform '{name}' is not set")));
            };
            if value.kind() != kind {
                return Err(binding_error(
                    label,
                    format!(
                        "uniform '{name}' expects {kind:?}, got {:?}",
                        value.kind()
                    ),
                ));
            }
            match value {
                UniformValue::Texture(texture) => {
                    check_feedback(label, name, *texture, output)?;
                    bindings.textures.push(*texture);
                }
                UniformValue::TextureList(list) => {
                    for texture in list {
                        check_feedback(label, name, Some(*texture), output)?;
                        bindings.textures.push(Some(*texture));
                    }
                }
                other => bindings.params.push(other.pack()),
            }
        }
        bindings.params.push([0.0; 4]);
        Ok(bindings)
    }
}

fn check_feedback(
    label: &str,
    name: &str,
    texture: Option<TextureRef>,
    output: Option<TargetId>,
) -> Result<()> {
    match (texture, output) {
        (Some(TextureRef::Target(read)), Some(write)) if read == write => Err(binding_error(
            label,
            format!("uniform '{name}' samples the target being rendered to"),
        )),
        _ => Ok(()),
    }
}

fn binding_error(label: &str, message: String) -> AfterglowError {
    AfterglowError::ShaderBinding {
        label: label.to_string(),
        message,
    }
}

// ============================================================================
// RenderBackend
// ============================================================================

/// Capability set the pipeline consumes.
///
/// Calls are sequential on one thread. A backend keeps one "currently bound"
/// render target (`None` = default framebuffer) and an auto-clear flag: when
/// set, the bound target is cleared before each draw into it.
pub trait RenderBackend {
    /// Scene type accepted by [`render_scene`](Self::render_scene).
    type Scene: ?Sized;
    /// Camera type accepted by [`render_scene`](Self::render_scene).
    type Camera: ?Sized;

    /// Allocate an offscreen color target (plus depth if requested).
    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<TargetId>;

    /// Reallocate the storage of `target`, keeping its identity and format.
    fn resize_render_target(&mut self, target: TargetId, width: u32, height: u32) -> Result<()>;

    /// Bind `target` for subsequent draws; `None` binds the default framebuffer.
    fn set_render_target(&mut self, target: Option<TargetId>) -> Result<()>;

    /// Currently bound target.
    fn render_target(&self) -> Option<TargetId>;

    /// Render the 3D scene into the bound target.
    fn render_scene(&mut self, scene: &Self::Scene, camera: &Self::Camera) -> Result<()>;

    /// Compile a full-screen program. Failures are fatal for the caller.
    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramId>;

    /// Draw one full-screen triangle with `program` into the bound target.
    fn draw_fullscreen(&mut self, program: ProgramId, uniforms: &UniformSet) -> Result<()>;

    /// Clear the bound target to `color`.
    fn clear(&mut self, color: Vec4) -> Result<()>;

    fn auto_clear(&self) -> bool;

    fn set_auto_clear(&mut self, enabled: bool);

    /// Upload decoded pixels as a sampleable texture.
    fn create_texture(&mut self, image: &DecodedImage, options: &TextureOptions)
    -> Result<TextureId>;

    /// Start loading an image file; the result is polled by the caller.
    fn load_texture(&mut self, path: &Path, params: &TextureParams) -> TextureLoad {
        TextureLoad::spawn(path.to_path_buf(), *params)
    }

    /// Submit recorded work.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
