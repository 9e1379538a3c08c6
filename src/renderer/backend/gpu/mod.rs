//! wgpu Render Backend
//!
//! [`WgpuBackend`] executes the pipeline on a GPU. Each full-screen program
//! becomes one shader module (deduplicated by source hash), one bind group
//! layout derived from its [`ProgramInterface`], and one render pipeline per
//! attachment format. Work is recorded into a single command encoder and
//! submitted on [`flush`](RenderBackend::flush).
//!
//! The default framebuffer is whatever view the host hands in through
//! [`WgpuBackend::set_frame_view`] each frame (usually the surface texture).

mod mipmap;

use std::borrow::Cow;

use glam::{Mat4, Vec4};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;
use xxhash_rust::xxh3::xxh3_128;

use self::mipmap::MipChainBuilder;
use super::{
    ProgramId, ProgramInterface, ProgramSource, RenderBackend, RenderTargetDesc, TargetId,
    TextureId,
};
use crate::errors::{AfterglowError, Result};
use crate::renderer::shader_gen::validate_wgsl;
use crate::resources::image::DecodedImage;
use crate::resources::texture::{
    ColorFormat, ColorSpace, FilterMode, MipmapPolicy, TextureOptions, WrapMode, mip_level_count,
};
use crate::resources::uniforms::{TextureRef, UniformSet};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

// ============================================================================
// Scene
// ============================================================================

/// Camera data handed to [`WgpuScene::record`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuCamera {
    pub view_projection: Mat4,
}

/// Attachment layout of the pass a scene is recorded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTargetInfo {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub width: u32,
    pub height: u32,
}

/// A scene drawn by the host's own pipelines.
pub trait WgpuScene {
    /// Create or update GPU resources before the pass begins.
    fn prepare(&self, _device: &wgpu::Device, _queue: &wgpu::Queue, _target: SceneTargetInfo) {}

    /// Record draw calls into an already-open render pass.
    fn record(&self, pass: &mut wgpu::RenderPass<'_>, camera: &GpuCamera, target: SceneTargetInfo);
}

// ============================================================================
// Internal objects
// ============================================================================

struct GpuTarget {
    desc: RenderTargetDesc,
    texture: wgpu::Texture,
    /// All mip levels, for sampling.
    sample_view: wgpu::TextureView,
    /// Mip 0, for rendering.
    attachment_view: wgpu::TextureView,
    depth_view: Option<wgpu::TextureView>,
}

struct GpuTexture {
    view: wgpu::TextureView,
    options: TextureOptions,
}

struct GpuProgram {
    label: String,
    interface: ProgramInterface,
    module: wgpu::ShaderModule,
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SamplerKey {
    mag_filter: FilterMode,
    min_filter: FilterMode,
    wrap_s: WrapMode,
    wrap_t: WrapMode,
    mipmaps: bool,
    anisotropy: u16,
}

impl SamplerKey {
    fn for_target(desc: &RenderTargetDesc) -> Self {
        Self {
            mag_filter: desc.filter,
            min_filter: desc.filter,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            mipmaps: desc.mipmaps == MipmapPolicy::Generate,
            anisotropy: 1,
        }
    }

    fn for_texture(options: &TextureOptions) -> Self {
        Self {
            mag_filter: options.mag_filter,
            min_filter: options.min_filter,
            wrap_s: options.wrap_s,
            wrap_t: options.wrap_t,
            mipmaps: options.mipmaps == MipmapPolicy::Generate,
            anisotropy: options.anisotropy.max(1),
        }
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

fn texture_format(format: ColorFormat) -> wgpu::TextureFormat {
    match format {
        ColorFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ColorFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        ColorFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

/// Storage format and texel bytes for uploading `image` as `options.format`.
///
/// 8-bit uploads keep the encoded bytes and let an `*Srgb` view decode them;
/// float uploads are converted to linear values up front.
fn texture_upload<'a>(
    image: &'a DecodedImage,
    options: &TextureOptions,
) -> (wgpu::TextureFormat, Cow<'a, [u8]>) {
    let space = options.color_space;
    let linear = || {
        (0..image.height()).flat_map(move |y| {
            (0..image.width()).flat_map(move |x| space.to_linear(image.texel(x, y)).to_array())
        })
    };
    match options.format {
        ColorFormat::Rgba8Unorm => {
            let format = match space {
                ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
                ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
            };
            (format, Cow::Borrowed(image.data()))
        }
        ColorFormat::Rgba16Float => (
            wgpu::TextureFormat::Rgba16Float,
            Cow::Owned(
                linear()
                    .flat_map(|c| half::f16::from_f32(c).to_ne_bytes())
                    .collect(),
            ),
        ),
        ColorFormat::Rgba32Float => (
            wgpu::TextureFormat::Rgba32Float,
            Cow::Owned(linear().flat_map(f32::to_ne_bytes).collect()),
        ),
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(AfterglowError::InvalidDimensions { width, height });
    }
    Ok(())
}

// ============================================================================
// Backend
// ============================================================================

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,

    targets: SlotMap<TargetId, GpuTarget>,
    textures: SlotMap<TextureId, GpuTexture>,
    programs: SlotMap<ProgramId, GpuProgram>,

    active: Option<TargetId>,
    frame: Option<(wgpu::TextureView, wgpu::TextureFormat, u32, u32)>,
    auto_clear: bool,
    clear_color: wgpu::Color,

    encoder: Option<wgpu::CommandEncoder>,
    modules: FxHashMap<u128, wgpu::ShaderModule>,
    samplers: FxHashMap<SamplerKey, wgpu::Sampler>,
    fallback: wgpu::TextureView,
    mip_chain: MipChainBuilder,
}

impl WgpuBackend {
    /// Wrap an existing device and queue.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let fallback = Self::create_fallback(&device, &queue);
        let mip_chain = MipChainBuilder::new(&device);
        Self {
            device,
            queue,
            targets: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            active: None,
            frame: None,
            auto_clear: true,
            clear_color: wgpu::Color::BLACK,
            encoder: None,
            modules: FxHashMap::default(),
            samplers: FxHashMap::default(),
            fallback,
            mip_chain,
        }
    }

    /// Request an adapter and device without a surface.
    pub async fn request_headless(power_preference: wgpu::PowerPreference) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| AfterglowError::AdapterRequestFailed(e.to_string()))?;

        let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("afterglow"),
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        log::info!("Headless wgpu backend on {:?}", adapter.get_info().backend);
        Ok(Self::new(device, queue))
    }

    /// Blocking [`request_headless`](Self::request_headless).
    pub fn headless() -> Result<Self> {
        pollster::block_on(Self::request_headless(wgpu::PowerPreference::default()))
    }

    fn create_fallback(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Fallback Texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[0, 0, 0, 0],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Set the view that `set_render_target(None)` renders into.
    pub fn set_frame_view(&mut self, view: wgpu::TextureView, format: wgpu::TextureFormat, width: u32, height: u32) {
        self.frame = Some((view, format, width, height));
    }

    /// Drop the frame view, e.g. after presenting.
    pub fn clear_frame_view(&mut self) {
        self.frame = None;
    }

    pub fn set_clear_color(&mut self, color: Vec4) {
        self.clear_color = wgpu::Color {
            r: f64::from(color.x),
            g: f64::from(color.y),
            b: f64::from(color.z),
            a: f64::from(color.w),
        };
    }

    /// Sampleable view of a render target, e.g. for presenting it.
    pub fn target_view(&self, target: TargetId) -> Result<&wgpu::TextureView> {
        self.targets
            .get(target)
            .map(|t| &t.sample_view)
            .ok_or(AfterglowError::InvalidHandle("render target"))
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("afterglow"),
                })
        })
    }

    fn load_op(&self, color: Option<wgpu::Color>) -> wgpu::LoadOp<wgpu::Color> {
        match color {
            Some(c) => wgpu::LoadOp::Clear(c),
            None if self.auto_clear => wgpu::LoadOp::Clear(self.clear_color),
            None => wgpu::LoadOp::Load,
        }
    }

    /// Attachment of the bound target: (view, format, size, depth view).
    fn bound_attachment(
        &self,
    ) -> Result<(wgpu::TextureView, wgpu::TextureFormat, (u32, u32), Option<wgpu::TextureView>)> {
        match self.active {
            None => {
                let (view, format, w, h) =
                    self.frame.as_ref().ok_or(AfterglowError::NoDefaultFramebuffer)?;
                Ok((view.clone(), *format, (*w, *h), None))
            }
            Some(id) => {
                let target = self
                    .targets
                    .get(id)
                    .ok_or(AfterglowError::InvalidHandle("render target"))?;
                Ok((
                    target.attachment_view.clone(),
                    target.texture.format(),
                    (target.desc.width, target.desc.height),
                    target.depth_view.clone(),
                ))
            }
        }
    }

    fn sampler(&mut self, key: SamplerKey) -> wgpu::Sampler {
        if let Some(sampler) = self.samplers.get(&key) {
            return sampler.clone();
        }
        let all_linear = key.mag_filter == FilterMode::Linear && key.min_filter == FilterMode::Linear;
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Cached Sampler"),
            address_mode_u: address_mode(key.wrap_s),
            address_mode_v: address_mode(key.wrap_t),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter_mode(key.mag_filter),
            min_filter: filter_mode(key.min_filter),
            mipmap_filter: if key.mipmaps && all_linear {
                wgpu::MipmapFilterMode::Linear
            } else {
                wgpu::MipmapFilterMode::Nearest
            },
            anisotropy_clamp: if key.mipmaps && all_linear { key.anisotropy } else { 1 },
            ..Default::default()
        });
        self.samplers.insert(key, sampler.clone());
        sampler
    }

    fn texture_binding(&mut self, texture: Option<TextureRef>) -> Result<(wgpu::TextureView, wgpu::Sampler)> {
        match texture {
            None => {
                let sampler = self.sampler(SamplerKey::for_texture(&TextureOptions::default()));
                Ok((self.fallback.clone(), sampler))
            }
            Some(TextureRef::Target(id)) => {
                let target = self
                    .targets
                    .get(id)
                    .ok_or(AfterglowError::InvalidHandle("render target"))?;
                let view = target.sample_view.clone();
                let key = SamplerKey::for_target(&target.desc);
                Ok((view, self.sampler(key)))
            }
            Some(TextureRef::Texture(id)) => {
                let texture = self
                    .textures
                    .get(id)
                    .ok_or(AfterglowError::InvalidHandle("texture"))?;
                let view = texture.view.clone();
                let key = SamplerKey::for_texture(&texture.options);
                Ok((view, self.sampler(key)))
            }
        }
    }

    fn check_format(&self, format: ColorFormat) -> Result<()> {
        if format == ColorFormat::Rgba32Float
            && !self.device.features().contains(wgpu::Features::FLOAT32_FILTERABLE)
        {
            return Err(AfterglowError::Backend(
                "Rgba32Float targets need the FLOAT32_FILTERABLE feature".to_string(),
            ));
        }
        Ok(())
    }

    fn allocate(&self, desc: &RenderTargetDesc) -> GpuTarget {
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let mip_levels = match desc.mipmaps {
            MipmapPolicy::Generate => mip_level_count(desc.width, desc.height),
            MipmapPolicy::None => 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size,
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let sample_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&desc.label),
            usage: Some(wgpu::TextureUsages::TEXTURE_BINDING),
            ..Default::default()
        });
        let attachment_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&desc.label),
            base_mip_level: 0,
            mip_level_count: Some(1),
            usage: Some(wgpu::TextureUsages::RENDER_ATTACHMENT),
            ..Default::default()
        });
        let depth_view = desc.depth_buffer.then(|| {
            self.device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(&format!("{} depth", desc.label)),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: DEPTH_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        GpuTarget {
            desc: desc.clone(),
            texture,
            sample_view,
            attachment_view,
            depth_view,
        }
    }

    fn create_bind_group_layout(&self, label: &str, interface: &ProgramInterface) -> wgpu::BindGroupLayout {
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        for k in 0..interface.texture_bindings().len() as u32 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1 + 2 * k,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + 2 * k,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &entries,
            })
    }

    fn program_pipeline(&mut self, program: ProgramId, format: wgpu::TextureFormat) -> Result<wgpu::RenderPipeline> {
        let prog = self
            .programs
            .get_mut(program)
            .ok_or(AfterglowError::InvalidHandle("program"))?;
        if let Some(pipeline) = prog.pipelines.get(&format) {
            return Ok(pipeline.clone());
        }

        log::debug!("Creating pipeline '{}' for {format:?}", prog.label);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&prog.label),
                layout: Some(&prog.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &prog.module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &prog.module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
        prog.pipelines.insert(format, pipeline.clone());
        Ok(pipeline)
    }

    fn regenerate_mips(&mut self) {
        let Some(id) = self.active else { return };
        let Some(target) = self.targets.get(id) else { return };
        if target.desc.mipmaps != MipmapPolicy::Generate {
            return;
        }
        let texture = target.texture.clone();
        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("afterglow"),
                })
        });
        self.mip_chain.generate(&self.device, encoder, &texture);
    }
}

impl RenderBackend for WgpuBackend {
    type Scene = dyn WgpuScene;
    type Camera = GpuCamera;

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<TargetId> {
        check_dimensions(desc.width, desc.height)?;
        self.check_format(desc.format)?;
        let target = self.allocate(desc);
        Ok(self.targets.insert(target))
    }

    fn resize_render_target(&mut self, target: TargetId, width: u32, height: u32) -> Result<()> {
        check_dimensions(width, height)?;
        let mut desc = self
            .targets
            .get(target)
            .map(|t| t.desc.clone())
            .ok_or(AfterglowError::InvalidHandle("render target"))?;
        desc.width = width;
        desc.height = height;
        let replacement = self.allocate(&desc);
        if let Some(slot) = self.targets.get_mut(target) {
            *slot = replacement;
        }
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

    fn render_scene(&mut self, scene: &dyn WgpuScene, camera: &GpuCamera) -> Result<()> {
        let (view, color_format, (width, height), depth_view) = self.bound_attachment()?;
        let info = SceneTargetInfo {
            color_format,
            depth_format: depth_view.as_ref().map(|_| DEPTH_FORMAT),
            width,
            height,
        };
        scene.prepare(&self.device, &self.queue, info);

        let color_load = self.load_op(None);
        let depth_load = if self.auto_clear {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };
        let encoder = self.encoder();
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: depth_view.as_ref().map(|depth| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view: depth,
                        depth_ops: Some(wgpu::Operations {
                            load: depth_load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            scene.record(&mut pass, camera, info);
        }
        self.regenerate_mips();
        Ok(())
    }

    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramId> {
        validate_wgsl(&source.label, &source.source)?;

        let hash = xxh3_128(source.source.as_bytes());
        let module = if let Some(module) = self.modules.get(&hash) {
            module.clone()
        } else {
            let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&source.label),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.source.clone())),
            });
            self.modules.insert(hash, module.clone());
            module
        };

        let layout = self.create_bind_group_layout(&source.label, &source.interface);
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&source.label),
                bind_group_layouts: &[Some(&layout)],
                immediate_size: 0,
            });

        log::debug!("Compiled program '{}' ({:032x})", source.label, hash);
        Ok(self.programs.insert(GpuProgram {
            label: source.label.clone(),
            interface: source.interface.clone(),
            module,
            layout,
            pipeline_layout,
            pipelines: FxHashMap::default(),
        }))
    }

    fn draw_fullscreen(&mut self, program: ProgramId, uniforms: &UniformSet) -> Result<()> {
        let (label, interface, layout) = {
            let prog = self
                .programs
                .get(program)
                .ok_or(AfterglowError::InvalidHandle("program"))?;
            (prog.label.clone(), prog.interface.clone(), prog.layout.clone())
        };
        let bindings = interface.resolve(&label, uniforms, self.active)?;
        let (view, format, _, _) = self.bound_attachment()?;
        let pipeline = self.program_pipeline(program, format)?;

        let params = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&label),
                contents: bytemuck::cast_slice(&bindings.params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut resources: SmallVec<[(wgpu::TextureView, wgpu::Sampler); 8]> = SmallVec::new();
        for texture in &bindings.textures {
            resources.push(self.texture_binding(*texture)?);
        }

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: params.as_entire_binding(),
        }];
        for (k, (view, sampler)) in resources.iter().enumerate() {
            let binding = 1 + 2 * k as u32;
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: binding + 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&label),
            layout: &layout,
            entries: &entries,
        });

        let load = self.load_op(None);
        let encoder = self.encoder();
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.regenerate_mips();
        Ok(())
    }

    fn clear(&mut self, color: Vec4) -> Result<()> {
        let (view, ..) = self.bound_attachment()?;
        let load = self.load_op(Some(wgpu::Color {
            r: f64::from(color.x),
            g: f64::from(color.y),
            b: f64::from(color.z),
            a: f64::from(color.w),
        }));
        let encoder = self.encoder();
        drop(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        }));
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
        self.check_format(options.format)?;
        let (format, data) = texture_upload(image, options);
        let mip_levels = match options.mipmaps {
            MipmapPolicy::Generate => mip_level_count(image.width(), image.height()),
            MipmapPolicy::None => 1,
        };
        let size = wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Loaded Texture"),
            size,
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(options.format.bytes_per_pixel() * image.width()),
                rows_per_image: Some(image.height()),
            },
            size,
        );
        if mip_levels > 1 {
            let encoder = self.encoder.get_or_insert_with(|| {
                self.device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("afterglow"),
                    })
            });
            self.mip_chain.generate(&self.device, encoder, &texture);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(self.textures.insert(GpuTexture {
            view,
            options: *options,
        }))
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_keys_follow_target_filter() {
        let mut desc = RenderTargetDesc::new("bloom0_h", 8, 8);
        desc.mipmaps = MipmapPolicy::Generate;
        let key = SamplerKey::for_target(&desc);
        assert!(key.mipmaps);
        assert_eq!(key.wrap_s, WrapMode::ClampToEdge);
        assert_eq!(key.anisotropy, 1);

        let options = TextureOptions {
            anisotropy: 0,
            ..TextureOptions::default()
        };
        assert_eq!(SamplerKey::for_texture(&options).anisotropy, 1);
    }

    #[test]
    fn formats_map_one_to_one() {
        assert_eq!(texture_format(ColorFormat::Rgba8Unorm), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(texture_format(ColorFormat::Rgba16Float), wgpu::TextureFormat::Rgba16Float);
        assert_eq!(texture_format(ColorFormat::Rgba32Float), wgpu::TextureFormat::Rgba32Float);
    }
}
