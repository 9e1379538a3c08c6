//! Software Render Backend
//!
//! A deterministic CPU implementation of [`RenderBackend`]. Programs are
//! still generated and validated as WGSL, then executed by a native kernel
//! that mirrors the template. Every draw is recorded in a log so callers can
//! inspect which passes ran, into which target, and what they sampled.
//!
//! Scenes are anything implementing [`RasterScene`]: a per-pixel shading
//! function evaluated through a [`RasterCamera`].

mod kernels;
pub mod pixels;

use glam::{Vec2, Vec4};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use self::kernels::{DrawInputs, Kernel};
pub use self::pixels::{PixelBuffer, Sampled};
use super::{
    ProgramId, ProgramInterface, ProgramSource, RenderBackend, RenderTargetDesc, TargetId,
    TextureId,
};
use crate::errors::{AfterglowError, Result};
use crate::renderer::shader_gen::validate_wgsl;
use crate::resources::image::DecodedImage;
use crate::resources::texture::{TextureOptions, WrapMode};
use crate::resources::uniforms::{TextureRef, UniformSet};

// ============================================================================
// Scene
// ============================================================================

/// 2D view transform applied to scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterCamera {
    pub offset: Vec2,
    pub zoom: f32,
}

impl Default for RasterCamera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl RasterCamera {
    /// Map a screen uv to scene coordinates.
    #[must_use]
    pub fn project(&self, uv: Vec2) -> Vec2 {
        (uv - 0.5) / self.zoom.max(f32::EPSILON) + 0.5 + self.offset
    }
}

/// A scene the software backend can rasterize.
pub trait RasterScene {
    /// Color at screen position `uv`, or `None` where nothing covers it.
    fn shade(&self, uv: Vec2, camera: &RasterCamera) -> Option<Vec4>;
}

impl<F> RasterScene for F
where
    F: Fn(Vec2) -> Vec4,
{
    fn shade(&self, uv: Vec2, camera: &RasterCamera) -> Option<Vec4> {
        Some(self(camera.project(uv)))
    }
}

// ============================================================================
// Draw log
// ============================================================================

/// One executed full-screen draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: String,
    pub target: Option<TargetId>,
    pub size: (u32, u32),
    /// Texture bindings in binding order.
    pub inputs: Vec<Option<TextureRef>>,
    /// Whether the target was auto-cleared first.
    pub cleared: bool,
}

// ============================================================================
// Backend
// ============================================================================

struct SoftwareTarget {
    desc: RenderTargetDesc,
    color: PixelBuffer,
}

struct SoftwareTexture {
    buffer: PixelBuffer,
    options: TextureOptions,
}

struct SoftwareProgram {
    label: String,
    kernel: Kernel,
    interface: ProgramInterface,
}

pub struct SoftwareBackend {
    targets: SlotMap<TargetId, SoftwareTarget>,
    textures: SlotMap<TextureId, SoftwareTexture>,
    programs: SlotMap<ProgramId, SoftwareProgram>,
    framebuffer: PixelBuffer,
    active: Option<TargetId>,
    auto_clear: bool,
    clear_color: Vec4,
    validate_shaders: bool,
    fallback: PixelBuffer,
    draws: Vec<DrawRecord>,
    scene_renders: usize,
}

impl SoftwareBackend {
    /// A backend whose default framebuffer is `width × height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            targets: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            framebuffer: PixelBuffer::new(width, height, Default::default()),
            active: None,
            auto_clear: true,
            clear_color: Vec4::W,
            validate_shaders: true,
            fallback: PixelBuffer::new(1, 1, Default::default()),
            draws: Vec::new(),
            scene_renders: 0,
        }
    }

    /// Resize the default framebuffer; contents are reset.
    pub fn resize_framebuffer(&mut self, width: u32, height: u32) {
        self.framebuffer.resize(width, height);
    }

    #[must_use]
    pub fn framebuffer(&self) -> &PixelBuffer {
        &self.framebuffer
    }

    /// Color contents of `target`, or of the default framebuffer for `None`.
    pub fn read_pixels(&self, target: Option<TargetId>) -> Result<&PixelBuffer> {
        match target {
            None => Ok(&self.framebuffer),
            Some(id) => self
                .targets
                .get(id)
                .map(|t| &t.color)
                .ok_or(AfterglowError::InvalidHandle("render target")),
        }
    }

    pub fn target_desc(&self, target: TargetId) -> Result<&RenderTargetDesc> {
        self.targets
            .get(target)
            .map(|t| &t.desc)
            .ok_or(AfterglowError::InvalidHandle("render target"))
    }

    pub fn texture_pixels(&self, texture: TextureId) -> Result<&PixelBuffer> {
        self.textures
            .get(texture)
            .map(|t| &t.buffer)
            .ok_or(AfterglowError::InvalidHandle("texture"))
    }

    #[must_use]
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Draws executed since the last [`clear_draw_log`](Self::clear_draw_log).
    #[must_use]
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn clear_draw_log(&mut self) {
        self.draws.clear();
        self.scene_renders = 0;
    }

    #[must_use]
    pub fn scene_renders(&self) -> usize {
        self.scene_renders
    }

    #[must_use]
    pub fn clear_color(&self) -> Vec4 {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: Vec4) {
        self.clear_color = color;
    }

    /// Toggle naga validation of program sources in `compile_program`.
    pub fn set_validate_shaders(&mut self, enabled: bool) {
        self.validate_shaders = enabled;
    }

    fn bound_buffer_mut(&mut self) -> Result<&mut PixelBuffer> {
        match self.active {
            None => Ok(&mut self.framebuffer),
            Some(id) => self
                .targets
                .get_mut(id)
                .map(|t| &mut t.color)
                .ok_or(AfterglowError::InvalidHandle("render target")),
        }
    }

    fn sampled(&self, texture: Option<TextureRef>) -> Result<Sampled<'_>> {
        match texture {
            None => Ok(Sampled::new(
                &self.fallback,
                Default::default(),
                WrapMode::ClampToEdge,
                WrapMode::ClampToEdge,
            )),
            Some(TextureRef::Target(id)) => {
                let target = self
                    .targets
                    .get(id)
                    .ok_or(AfterglowError::InvalidHandle("render target"))?;
                Ok(Sampled::new(
                    &target.color,
                    target.desc.filter,
                    WrapMode::ClampToEdge,
                    WrapMode::ClampToEdge,
                ))
            }
            Some(TextureRef::Texture(id)) => {
                let texture = self
                    .textures
                    .get(id)
                    .ok_or(AfterglowError::InvalidHandle("texture"))?;
                Ok(Sampled::new(
                    &texture.buffer,
                    texture.options.mag_filter,
                    texture.options.wrap_s,
                    texture.options.wrap_t,
                ))
            }
        }
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(AfterglowError::InvalidDimensions { width, height });
    }
    Ok(())
}

impl RenderBackend for SoftwareBackend {
    type Scene = dyn RasterScene;
    type Camera = RasterCamera;

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<TargetId> {
        check_dimensions(desc.width, desc.height)?;
        let color = PixelBuffer::new(desc.width, desc.height, desc.format);
        Ok(self.targets.insert(SoftwareTarget {
            desc: desc.clone(),
            color,
        }))
    }

    fn resize_render_target(&mut self, target: TargetId, width: u32, height: u32) -> Result<()> {
        check_dimensions(width, height)?;
        let entry = self
            .targets
            .get_mut(target)
            .ok_or(AfterglowError::InvalidHandle("render target"))?;
        entry.desc.width = width;
        entry.desc.height = height;
        entry.color.resize(width, height);
        Ok(())
    }

    fn set_render_target(&mut self, target: Option<TargetId>) -> Result<()> {
        if let Some(id) = target
            && !self.targets.contains_key(id)
        {
            return Err(AfterglowError::InvalidHandle("render target"));
        }
        self.active = target;
        Ok(())
    }

    fn render_target(&self) -> Option<TargetId> {
        self.active
    }

    fn render_scene(&mut self, scene: &dyn RasterScene, camera: &RasterCamera) -> Result<()> {
        let auto_clear = self.auto_clear;
        let clear_color = self.clear_color;
        let buffer = self.bound_buffer_mut()?;
        let (width, height) = buffer.size();

        if auto_clear {
            buffer.fill(clear_color);
        }
        let size = Vec2::new(width as f32, height as f32);
        let mut pixels = buffer.pixels().to_vec();
        for y in 0..height {
            for x in 0..width {
                let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
                if let Some(color) = scene.shade(uv, camera) {
                    pixels[y as usize * width as usize + x as usize] = color;
                }
            }
        }
        buffer.store(pixels);
        self.scene_renders += 1;
        Ok(())
    }

    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramId> {
        if self.validate_shaders {
            validate_wgsl(&source.label, &source.source)?;
        }
        let kernel = Kernel::compile(source)?;
        log::debug!("Compiled software program '{}'", source.label);
        Ok(self.programs.insert(SoftwareProgram {
            label: source.label.clone(),
            kernel,
            interface: source.interface.clone(),
        }))
    }

    fn draw_fullscreen(&mut self, program: ProgramId, uniforms: &UniformSet) -> Result<()> {
        let prog = self
            .programs
            .get(program)
            .ok_or(AfterglowError::InvalidHandle("program"))?;
        let bindings = prog.interface.resolve(&prog.label, uniforms, self.active)?;

        let mut textures = FxHashMap::default();
        for (name, texture) in prog
            .interface
            .texture_bindings()
            .into_iter()
            .zip(bindings.textures.iter())
        {
            textures.insert(name, self.sampled(*texture)?);
        }

        let (width, height) = match self.active {
            None => self.framebuffer.size(),
            Some(id) => self
                .targets
                .get(id)
                .map(|t| t.color.size())
                .ok_or(AfterglowError::InvalidHandle("render target"))?,
        };

        let inputs = DrawInputs {
            label: &prog.label,
            uniforms,
            textures,
        };
        let pixels = kernels::execute(&prog.kernel, &inputs, width, height)?;
        let record = DrawRecord {
            program: prog.label.clone(),
            target: self.active,
            size: (width, height),
            inputs: bindings.textures.to_vec(),
            cleared: self.auto_clear,
        };
        drop(inputs);

        self.bound_buffer_mut()?.store(pixels);
        log::trace!("Software draw '{}' into {:?}", record.program, record.target);
        self.draws.push(record);
        Ok(())
    }

    fn clear(&mut self, color: Vec4) -> Result<()> {
        self.bound_buffer_mut()?.fill(color);
        Ok(())
    }

    fn auto_clear(&self) -> bool {
        self.auto_clear
    }

    fn set_auto_clear(&mut self, enabled: bool) {
        self.auto_clear = enabled;
    }

    fn create_texture(
        &mut self,
        image: &DecodedImage,
        options: &TextureOptions,
    ) -> Result<TextureId> {
        check_dimensions(image.width(), image.height())?;
        let texels = PixelBuffer::from_image(image)
            .pixels()
            .iter()
            .map(|&p| options.color_space.to_linear(p))
            .collect();
        let mut buffer = PixelBuffer::new(image.width(), image.height(), options.format);
        buffer.store(texels);
        Ok(self.textures.insert(SoftwareTexture {
            buffer,
            options: *options,
        }))
    }
}
